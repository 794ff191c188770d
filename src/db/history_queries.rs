use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::models::history::{NewHistoryEntry, PriceHistoryEntry};

pub(crate) const HISTORY_COLUMNS: &str =
    "id, property_id, check_in_date, price, previous_price, change_percentage, captured_at";

/// Latest entry for a (property, check-in date) pair.
pub async fn latest_entry(
    conn: &mut PgConnection,
    property_id: i64,
    check_in_date: NaiveDate,
) -> Result<Option<PriceHistoryEntry>, sqlx::Error> {
    sqlx::query_as::<_, PriceHistoryEntry>(&format!(
        r#"
        SELECT {HISTORY_COLUMNS}
        FROM price_history
        WHERE property_id = $1 AND check_in_date = $2
        ORDER BY captured_at DESC, id DESC
        LIMIT 1
        "#
    ))
    .bind(property_id)
    .bind(check_in_date)
    .fetch_optional(conn)
    .await
}

/// Append a change record.
pub async fn append_entry(
    conn: &mut PgConnection,
    entry: &NewHistoryEntry,
) -> Result<PriceHistoryEntry, sqlx::Error> {
    sqlx::query_as::<_, PriceHistoryEntry>(&format!(
        r#"
        INSERT INTO price_history
            (property_id, check_in_date, price, previous_price, change_percentage, captured_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {HISTORY_COLUMNS}
        "#
    ))
    .bind(entry.property_id)
    .bind(entry.check_in_date)
    .bind(entry.price)
    .bind(entry.previous_price)
    .bind(entry.change_percentage)
    .bind(entry.captured_at)
    .fetch_one(conn)
    .await
}

/// Change log of a property over a check-in window, oldest capture first.
pub async fn list_for_property(
    pool: &PgPool,
    property_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<PriceHistoryEntry>, sqlx::Error> {
    sqlx::query_as::<_, PriceHistoryEntry>(&format!(
        r#"
        SELECT {HISTORY_COLUMNS}
        FROM price_history
        WHERE property_id = $1 AND check_in_date BETWEEN $2 AND $3
        ORDER BY check_in_date ASC, captured_at ASC, id ASC
        "#
    ))
    .bind(property_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}
