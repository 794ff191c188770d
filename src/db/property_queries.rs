use sqlx::{PgExecutor, PgPool};

use crate::models::property::Property;

const PROPERTY_COLUMNS: &str =
    "id, uuid, hotel_id, name, external_url, platform, is_main_property, active, created_at";

/// Get a property by ID
pub async fn get_property(pool: &PgPool, property_id: i64) -> Result<Option<Property>, sqlx::Error> {
    sqlx::query_as::<_, Property>(&format!(
        "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
    ))
    .bind(property_id)
    .fetch_optional(pool)
    .await
}

/// All properties of a hotel, main property first.
pub async fn list_hotel_properties<'e>(
    executor: impl PgExecutor<'e>,
    hotel_id: i64,
    active_only: bool,
) -> Result<Vec<Property>, sqlx::Error> {
    sqlx::query_as::<_, Property>(&format!(
        r#"
        SELECT {PROPERTY_COLUMNS}
        FROM properties
        WHERE hotel_id = $1
          AND (active OR NOT $2)
        ORDER BY is_main_property DESC, name ASC
        "#
    ))
    .bind(hotel_id)
    .bind(active_only)
    .fetch_all(executor)
    .await
}

/// Names of the given property IDs, for labelling progress rows.
pub async fn property_names(
    pool: &PgPool,
    ids: &[i64],
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM properties WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

/// Insert a property (used by seeding and tests).
pub async fn insert_property(
    pool: &PgPool,
    hotel_id: i64,
    name: &str,
    external_url: &str,
    platform: &str,
    is_main_property: bool,
) -> Result<Property, sqlx::Error> {
    sqlx::query_as::<_, Property>(&format!(
        r#"
        INSERT INTO properties (hotel_id, name, external_url, platform, is_main_property)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {PROPERTY_COLUMNS}
        "#
    ))
    .bind(hotel_id)
    .bind(name)
    .bind(external_url)
    .bind(platform)
    .bind(is_main_property)
    .fetch_one(pool)
    .await
}
