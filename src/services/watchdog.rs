use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::warn;

use crate::db::job_queries;
use crate::error::EngineError;
use crate::models::job::SearchJob;
use crate::services::jobs::JobStateMachine;

/// Whether a running search has been silent for longer than `threshold`.
pub fn is_stalled(job: &SearchJob, now: DateTime<Utc>, threshold: Duration) -> bool {
    match job.last_progress_at.or(job.started_at) {
        Some(last) => now.signed_duration_since(last) > threshold,
        None => false,
    }
}

/// Fails RUNNING searches that stopped reporting progress.
pub struct Watchdog {
    db: PgPool,
    jobs: JobStateMachine,
    threshold: Duration,
}

impl Watchdog {
    pub fn new(db: PgPool, jobs: JobStateMachine, threshold: Duration) -> Self {
        Self { db, jobs, threshold }
    }

    /// One sweep. Returns the number of searches failed.
    pub async fn sweep(&self) -> Result<usize, EngineError> {
        let now = Utc::now();
        let candidates = job_queries::list_stalled(&self.db, now - self.threshold).await?;

        let mut failed = 0;
        for job in candidates.iter().filter(|j| is_stalled(j, now, self.threshold)) {
            let silent_for = now.signed_duration_since(job.last_progress_at.or(job.started_at).unwrap_or(now));
            let message = format!(
                "stalled: no progress for {}s (threshold {}s) at {}/{} dates",
                silent_for.num_seconds(),
                self.threshold.num_seconds(),
                job.processed_dates,
                job.total_dates
            );
            warn!(job_id = %job.id, property_id = job.property_id, "{}", message);
            self.jobs.fail(job.id, &message).await?;
            metrics::counter!("search_jobs_stalled_total").increment(1);
            failed += 1;
        }

        Ok(failed)
    }
}
