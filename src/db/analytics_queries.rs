use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::analytics::DailyAggregate;

/// Nightly-rate aggregates per property and check-in date for a hotel.
/// Dates without quotes produce no row.
pub async fn daily_aggregates(
    pool: &PgPool,
    hotel_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailyAggregate>, sqlx::Error> {
    sqlx::query_as::<_, DailyAggregate>(
        r#"
        SELECT o.property_id,
               o.check_in_date,
               COUNT(*) AS count,
               ROUND(AVG(o.price / o.bundle_size), 2) AS avg,
               ROUND(MIN(o.price / o.bundle_size), 2) AS min,
               ROUND(MAX(o.price / o.bundle_size), 2) AS max
        FROM price_observations o
        JOIN properties p ON p.id = o.property_id
        WHERE p.hotel_id = $1
          AND p.active
          AND o.check_in_date BETWEEN $2 AND $3
          AND o.availability_status = 'AVAILABLE'
        GROUP BY o.property_id, o.check_in_date
        ORDER BY o.check_in_date ASC, o.property_id ASC
        "#,
    )
    .bind(hotel_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}
