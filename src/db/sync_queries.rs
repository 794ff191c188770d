//! Bulk reads and writes used when replicating a hotel between databases.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::history_queries::HISTORY_COLUMNS;
use crate::db::job_queries::{job_from_row, JOB_COLUMNS};
use crate::db::observation_queries::OBSERVATION_COLUMNS;
use crate::models::history::PriceHistoryEntry;
use crate::models::job::SearchJob;
use crate::models::observation::PriceObservation;
use crate::models::sync::TableCounts;

pub async fn jobs_for_properties(pool: &PgPool, property_ids: &[i64]) -> Result<Vec<SearchJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {JOB_COLUMNS} FROM search_jobs WHERE property_id = ANY($1) ORDER BY created_at ASC"
    ))
    .bind(property_ids)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

pub async fn observations_for_properties(
    pool: &PgPool,
    property_ids: &[i64],
) -> Result<Vec<PriceObservation>, sqlx::Error> {
    sqlx::query_as::<_, PriceObservation>(&format!(
        "SELECT {OBSERVATION_COLUMNS} FROM price_observations WHERE property_id = ANY($1) ORDER BY id ASC"
    ))
    .bind(property_ids)
    .fetch_all(pool)
    .await
}

pub async fn history_for_properties(
    pool: &PgPool,
    property_ids: &[i64],
) -> Result<Vec<PriceHistoryEntry>, sqlx::Error> {
    sqlx::query_as::<_, PriceHistoryEntry>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM price_history WHERE property_id = ANY($1) ORDER BY captured_at ASC, id ASC"
    ))
    .bind(property_ids)
    .fetch_all(pool)
    .await
}

/// Remove the rows an earlier sync copied onto the given destination
/// properties. Children first; native destination rows stay.
pub async fn delete_scope(conn: &mut PgConnection, property_ids: &[i64]) -> Result<TableCounts, sqlx::Error> {
    let history = sqlx::query("DELETE FROM price_history WHERE property_id = ANY($1) AND replicated")
        .bind(property_ids)
        .execute(&mut *conn)
        .await?;
    let observations = sqlx::query(
        r#"
        DELETE FROM price_observations
        WHERE search_id IN (
            SELECT id FROM search_jobs
            WHERE property_id = ANY($1) AND source_job_id IS NOT NULL
        )
        "#,
    )
    .bind(property_ids)
    .execute(&mut *conn)
    .await?;
    let jobs = sqlx::query("DELETE FROM search_jobs WHERE property_id = ANY($1) AND source_job_id IS NOT NULL")
        .bind(property_ids)
        .execute(&mut *conn)
        .await?;

    Ok(TableCounts {
        search_jobs: jobs.rows_affected(),
        price_observations: observations.rows_affected(),
        price_history: history.rows_affected(),
    })
}

/// Insert a re-keyed job row, remembering the source job it was copied from.
pub async fn insert_job_row(
    conn: &mut PgConnection,
    job: &SearchJob,
    source_job_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO search_jobs
            (id, property_id, hotel_id, start_date, end_date, status, search_type, bundle_nights,
             total_dates, processed_dates, total_prices_found, started_at, completed_at,
             last_progress_at, error_log, created_at, source_job_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(job.id)
    .bind(job.property_id)
    .bind(job.hotel_id)
    .bind(job.date_range.start)
    .bind(job.date_range.end)
    .bind(job.status.to_string())
    .bind(job.search_type.to_string())
    .bind(job.bundle_nights)
    .bind(job.total_dates)
    .bind(job.processed_dates)
    .bind(job.total_prices_found)
    .bind(job.started_at)
    .bind(job.completed_at)
    .bind(job.last_progress_at)
    .bind(&job.error_log)
    .bind(job.created_at)
    .bind(source_job_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert an observation under a fresh destination id. Returns `false` when
/// a destination quote already holds its (property, date, scraped_at) key.
pub async fn insert_observation_row(conn: &mut PgConnection, obs: &PriceObservation) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO price_observations
            (search_id, property_id, check_in_date, check_out_date, room_type, price, currency,
             availability_status, is_bundle, bundle_size, scraped_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (property_id, check_in_date, scraped_at) DO NOTHING
        "#,
    )
    .bind(obs.search_id)
    .bind(obs.property_id)
    .bind(obs.check_in_date)
    .bind(obs.check_out_date)
    .bind(&obs.room_type)
    .bind(obs.price)
    .bind(&obs.currency)
    .bind(&obs.availability_status)
    .bind(obs.is_bundle)
    .bind(obs.bundle_size)
    .bind(obs.scraped_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Insert a history entry under a fresh destination id.
pub async fn insert_history_row(conn: &mut PgConnection, entry: &PriceHistoryEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO price_history
            (property_id, check_in_date, price, previous_price, change_percentage, captured_at, replicated)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        "#,
    )
    .bind(entry.property_id)
    .bind(entry.check_in_date)
    .bind(entry.price)
    .bind(entry.previous_price)
    .bind(entry.change_percentage)
    .bind(entry.captured_at)
    .execute(conn)
    .await?;

    Ok(())
}
