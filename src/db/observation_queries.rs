use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::models::observation::{NewObservation, PriceObservation};

pub(crate) const OBSERVATION_COLUMNS: &str = r#"
    id, search_id, property_id, check_in_date, check_out_date, room_type, price, currency,
    availability_status, is_bundle, bundle_size, scraped_at
"#;

/// Insert a quote unless one already exists for
/// (property_id, check_in_date, scraped_at).
///
/// Returns the stored row, or `None` for a duplicate.
pub async fn insert_observation(
    conn: &mut PgConnection,
    search_id: Uuid,
    property_id: i64,
    obs: &NewObservation,
) -> Result<Option<PriceObservation>, sqlx::Error> {
    sqlx::query_as::<_, PriceObservation>(&format!(
        r#"
        INSERT INTO price_observations
            (search_id, property_id, check_in_date, check_out_date, room_type, price, currency,
             availability_status, is_bundle, bundle_size, scraped_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (property_id, check_in_date, scraped_at) DO NOTHING
        RETURNING {OBSERVATION_COLUMNS}
        "#
    ))
    .bind(search_id)
    .bind(property_id)
    .bind(obs.check_in_date)
    .bind(obs.check_out_date)
    .bind(&obs.room_type)
    .bind(obs.price)
    .bind(&obs.currency)
    .bind(obs.availability_status.to_string())
    .bind(obs.is_bundle())
    .bind(obs.bundle_size)
    .bind(obs.scraped_at)
    .fetch_optional(conn)
    .await
}

/// All quotes gathered by a search, by check-in date.
pub async fn list_for_search(
    pool: &PgPool,
    search_id: Uuid,
) -> Result<Vec<PriceObservation>, sqlx::Error> {
    sqlx::query_as::<_, PriceObservation>(&format!(
        r#"
        SELECT {OBSERVATION_COLUMNS}
        FROM price_observations
        WHERE search_id = $1
        ORDER BY check_in_date ASC, scraped_at ASC
        "#
    ))
    .bind(search_id)
    .fetch_all(pool)
    .await
}

/// Number of stored quotes for a search.
pub async fn count_for_search(pool: &PgPool, search_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM price_observations WHERE search_id = $1")
        .bind(search_id)
        .fetch_one(pool)
        .await?;

    row.try_get("n")
}
