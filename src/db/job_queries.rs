use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::error::is_admission_violation;
use crate::models::job::{DateRange, SearchJob, SearchStatus, SearchType};
use crate::models::progress::ProgressStats;

pub(crate) const JOB_COLUMNS: &str = r#"
    id, property_id, hotel_id, start_date, end_date, status, search_type, bundle_nights,
    total_dates, processed_dates, total_prices_found, started_at, completed_at,
    last_progress_at, error_log, created_at, updated_at
"#;

pub(crate) fn job_from_row(r: &PgRow) -> Result<SearchJob, sqlx::Error> {
    let status_str: String = r.try_get("status")?;
    let status = status_str
        .parse::<SearchStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let type_str: String = r.try_get("search_type")?;
    let search_type = type_str
        .parse::<SearchType>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(SearchJob {
        id: r.try_get("id")?,
        property_id: r.try_get("property_id")?,
        hotel_id: r.try_get("hotel_id")?,
        date_range: DateRange {
            start: r.try_get("start_date")?,
            end: r.try_get("end_date")?,
        },
        status,
        search_type,
        bundle_nights: r.try_get("bundle_nights")?,
        total_dates: r.try_get("total_dates")?,
        processed_dates: r.try_get("processed_dates")?,
        total_prices_found: r.try_get("total_prices_found")?,
        started_at: r.try_get("started_at")?,
        completed_at: r.try_get("completed_at")?,
        last_progress_at: r.try_get("last_progress_at")?,
        error_log: r.try_get("error_log")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Insert a new pending search.
pub async fn create_job(
    conn: &mut PgConnection,
    property_id: i64,
    hotel_id: i64,
    range: DateRange,
    search_type: SearchType,
    bundle_nights: i32,
) -> Result<SearchJob, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO search_jobs
            (property_id, hotel_id, start_date, end_date, status, search_type, bundle_nights, total_dates)
        VALUES ($1, $2, $3, $4, 'PENDING', $5, $6, $7)
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(property_id)
    .bind(hotel_id)
    .bind(range.start)
    .bind(range.end)
    .bind(search_type.to_string())
    .bind(bundle_nights)
    .bind(range.total_dates())
    .fetch_one(conn)
    .await?;

    job_from_row(&row)
}

/// Get a search by ID
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<Option<SearchJob>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM search_jobs WHERE id = $1"))
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Result of trying to move a search to RUNNING.
#[derive(Debug)]
pub enum StartOutcome {
    Started(SearchJob),
    /// The search was not PENDING; nothing changed.
    NotPending,
    /// Another search for the same property is already RUNNING.
    AdmissionDenied,
}

/// Move a pending search to RUNNING.
///
/// Admission is decided by the partial unique index on running searches, so
/// two concurrent starts for one property cannot both succeed.
pub async fn start_job(conn: &mut PgConnection, job_id: Uuid) -> Result<StartOutcome, sqlx::Error> {
    let result = sqlx::query(&format!(
        r#"
        UPDATE search_jobs
        SET status = 'RUNNING',
            started_at = NOW(),
            completed_at = NULL,
            last_progress_at = NOW()
        WHERE id = $1 AND status = 'PENDING'
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job_id)
    .fetch_optional(conn)
    .await;

    match result {
        Ok(Some(row)) => Ok(StartOutcome::Started(job_from_row(&row)?)),
        Ok(None) => Ok(StartOutcome::NotPending),
        Err(e) if is_admission_violation(&e) => Ok(StartOutcome::AdmissionDenied),
        Err(e) => Err(e),
    }
}

/// Increment counters of a running search. `processed_dates` never exceeds
/// `total_dates`.
///
/// Returns `Ok(None)` when the search is not RUNNING.
pub async fn advance_job(
    pool: &PgPool,
    job_id: Uuid,
    processed_delta: i32,
    prices_found_delta: i32,
) -> Result<Option<SearchJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE search_jobs
        SET processed_dates = LEAST(processed_dates + $2, total_dates),
            total_prices_found = total_prices_found + $3,
            last_progress_at = NOW()
        WHERE id = $1 AND status = 'RUNNING'
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job_id)
    .bind(processed_delta)
    .bind(prices_found_delta)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Move a search into a terminal state from any of `from`.
///
/// Returns `Ok(None)` when the search was not in one of `from`.
pub async fn finish_job(
    pool: &PgPool,
    job_id: Uuid,
    status: SearchStatus,
    from: &[SearchStatus],
    error: Option<&str>,
) -> Result<Option<SearchJob>, sqlx::Error> {
    let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();

    let row = sqlx::query(&format!(
        r#"
        UPDATE search_jobs
        SET status = $2,
            error_log = COALESCE($3, error_log),
            completed_at = NOW()
        WHERE id = $1 AND status = ANY($4)
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job_id)
    .bind(status.to_string())
    .bind(error)
    .bind(&from)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Replace the error log of a failed search. The only update allowed once a
/// search is terminal.
pub async fn update_error_log(pool: &PgPool, job_id: Uuid, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE search_jobs
        SET error_log = $2
        WHERE id = $1 AND status = 'FAILED'
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}

/// Searches in the given status, oldest first.
pub async fn list_jobs_by_status(
    pool: &PgPool,
    status: SearchStatus,
    limit: i64,
) -> Result<Vec<SearchJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM search_jobs
        WHERE status = $1
        ORDER BY created_at ASC
        LIMIT $2
        "#
    ))
    .bind(status.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Most recently finished searches, newest first.
pub async fn list_recent_terminal(pool: &PgPool, limit: i64) -> Result<Vec<SearchJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM search_jobs
        WHERE status IN ('COMPLETED', 'FAILED', 'CANCELLED')
        ORDER BY completed_at DESC NULLS LAST
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Running searches that have not reported progress since `cutoff`.
pub async fn list_stalled(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<SearchJob>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM search_jobs
        WHERE status = 'RUNNING'
          AND COALESCE(last_progress_at, started_at) < $1
        ORDER BY started_at ASC
        "#
    ))
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Dashboard counters. "Today" starts at `day_start`.
pub async fn job_stats(pool: &PgPool, day_start: DateTime<Utc>) -> Result<ProgressStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status = 'RUNNING') AS running_count,
            COUNT(*) FILTER (WHERE status = 'PENDING') AS pending_count,
            COUNT(*) FILTER (WHERE status = 'COMPLETED' AND completed_at >= $1) AS completed_today,
            COUNT(*) FILTER (WHERE status = 'FAILED' AND completed_at >= $1) AS failed_today
        FROM search_jobs
        "#,
    )
    .bind(day_start)
    .fetch_one(pool)
    .await?;

    Ok(ProgressStats {
        running_count: row.try_get("running_count")?,
        pending_count: row.try_get("pending_count")?,
        completed_today: row.try_get("completed_today")?,
        failed_today: row.try_get("failed_today")?,
    })
}
