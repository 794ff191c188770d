use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{job_queries, observation_queries, property_queries};
use crate::error::EngineError;
use crate::models::job::{SearchJob, SearchStatus};
use crate::models::observation::PriceStats;
use crate::models::progress::{Eta, JobProgress, ProgressSnapshot, SearchDetail};

/// Maximum running searches listed in a snapshot.
const RUNNING_LIMIT: i64 = 50;

/// Finished searches listed in a snapshot.
const RECENT_LIMIT: i64 = 10;

/// Percentage of dates processed, rounded and clamped to 0..=100.
pub fn progress_percent(processed: i32, total: i32) -> u8 {
    if total <= 0 {
        return 0;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Time since the search started, frozen once it finished.
pub fn elapsed(job: &SearchJob, now: DateTime<Utc>) -> Duration {
    match job.started_at {
        Some(started) => {
            let end = job.completed_at.unwrap_or(now);
            (end - started).max(Duration::zero())
        }
        None => Duration::zero(),
    }
}

/// Remaining time extrapolated from the observed processing rate.
pub fn eta(job: &SearchJob, elapsed: Duration) -> Eta {
    if job.status.is_terminal() {
        return Eta::Done;
    }
    if job.processed_dates <= 0 {
        return Eta::Calculating;
    }
    let remaining = (job.total_dates - job.processed_dates).max(0) as i64;
    let millis = elapsed.num_milliseconds() * remaining / job.processed_dates as i64;
    Eta::Estimated {
        seconds: millis / 1000,
    }
}

/// Derive the progress view of a search at `now`.
pub fn derive(job: &SearchJob, property_name: Option<String>, now: DateTime<Utc>) -> JobProgress {
    let elapsed = elapsed(job, now);
    JobProgress {
        job_id: job.id,
        property_id: job.property_id,
        property_name,
        status: job.status,
        processed_dates: job.processed_dates,
        total_dates: job.total_dates,
        total_prices_found: job.total_prices_found,
        progress_percent: progress_percent(job.processed_dates, job.total_dates),
        elapsed_seconds: elapsed.num_seconds(),
        eta: eta(job, elapsed),
        throughput: job.total_prices_found as f64 / job.processed_dates.max(1) as f64,
        started_at: job.started_at,
        completed_at: job.completed_at,
        error_log: job.error_log.clone(),
    }
}

/// Read-only progress views for polling clients.
#[derive(Clone)]
pub struct ProgressTracker {
    db: PgPool,
}

impl ProgressTracker {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn snapshot(&self) -> Result<ProgressSnapshot, EngineError> {
        let now = Utc::now();
        let running = job_queries::list_jobs_by_status(&self.db, SearchStatus::Running, RUNNING_LIMIT).await?;
        let recent = job_queries::list_recent_terminal(&self.db, RECENT_LIMIT).await?;
        let day_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let stats = job_queries::job_stats(&self.db, day_start).await?;

        let ids: Vec<i64> = running
            .iter()
            .chain(recent.iter())
            .map(|j| j.property_id)
            .collect();
        let names: HashMap<i64, String> = property_queries::property_names(&self.db, &ids)
            .await?
            .into_iter()
            .collect();
        let label = |job: &SearchJob| derive(job, names.get(&job.property_id).cloned(), now);

        Ok(ProgressSnapshot {
            running_searches: running.iter().map(label).collect(),
            recent_completed: recent.iter().map(label).collect(),
            stats,
        })
    }

    pub async fn progress(&self, job_id: Uuid) -> Result<JobProgress, EngineError> {
        let job = job_queries::get_job(&self.db, job_id)
            .await?
            .ok_or_else(|| EngineError::search_not_found(job_id))?;
        let name = property_queries::get_property(&self.db, job.property_id)
            .await?
            .map(|p| p.name);
        Ok(derive(&job, name, Utc::now()))
    }

    pub async fn detail(&self, job_id: Uuid) -> Result<SearchDetail, EngineError> {
        let job = job_queries::get_job(&self.db, job_id)
            .await?
            .ok_or_else(|| EngineError::search_not_found(job_id))?;
        let name = property_queries::get_property(&self.db, job.property_id)
            .await?
            .map(|p| p.name);
        let observations = observation_queries::list_for_search(&self.db, job_id).await?;
        let stats = PriceStats::from_observations(&observations);

        Ok(SearchDetail {
            progress: derive(&job, name, Utc::now()),
            job,
            observations,
            stats,
        })
    }
}
