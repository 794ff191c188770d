use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::job_queries::{self, StartOutcome};
use crate::db::property_queries;
use crate::error::EngineError;
use crate::models::job::{DateRange, NewSearch, SearchJob, SearchStatus};
use crate::models::property::Property;

/// Owns the search lifecycle: PENDING → RUNNING → COMPLETED | FAILED | CANCELLED.
///
/// Every transition is a single conditional UPDATE, so the database row is the
/// only source of truth and duplicate terminal signals are harmless.
#[derive(Clone)]
pub struct JobStateMachine {
    db: PgPool,
}

impl JobStateMachine {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get(&self, job_id: Uuid) -> Result<SearchJob, EngineError> {
        job_queries::get_job(&self.db, job_id)
            .await?
            .ok_or_else(|| EngineError::search_not_found(job_id))
    }

    /// Create a PENDING search for an active property.
    pub async fn create(&self, request: &NewSearch) -> Result<SearchJob, EngineError> {
        let range = DateRange::new(request.date_range.start, request.date_range.end)?;
        let nights = request.nights()?;
        let property = self.searchable_property(request.property_id).await?;

        let mut conn = self.db.acquire().await?;
        let job = job_queries::create_job(
            &mut conn,
            property.id,
            property.hotel_id,
            range,
            request.search_type,
            nights,
        )
        .await?;

        metrics::counter!("search_jobs_created_total").increment(1);
        info!(
            job_id = %job.id,
            property_id = job.property_id,
            total_dates = job.total_dates,
            search_type = %job.search_type,
            "Search created"
        );

        Ok(job)
    }

    /// PENDING → RUNNING, subject to one running search per property.
    pub async fn start(&self, job_id: Uuid) -> Result<SearchJob, EngineError> {
        let mut conn = self.db.acquire().await?;
        let outcome = job_queries::start_job(&mut conn, job_id).await?;
        drop(conn);

        match outcome {
            StartOutcome::Started(job) => {
                metrics::counter!("search_jobs_started_total").increment(1);
                info!(job_id = %job.id, property_id = job.property_id, "Search started");
                Ok(job)
            }
            StartOutcome::NotPending => {
                let job = self.get(job_id).await?;
                Err(EngineError::StateConflict {
                    job_id,
                    status: job.status,
                    action: "start",
                })
            }
            StartOutcome::AdmissionDenied => {
                let job = self.get(job_id).await?;
                metrics::counter!("search_jobs_admission_denied_total").increment(1);
                warn!(
                    job_id = %job_id,
                    property_id = job.property_id,
                    "Search start denied, property already has a running search"
                );
                Err(EngineError::AdmissionDenied {
                    property_id: job.property_id,
                })
            }
        }
    }

    /// Create and start in one transaction. A denied admission leaves no row.
    pub async fn launch(&self, request: &NewSearch) -> Result<SearchJob, EngineError> {
        let range = DateRange::new(request.date_range.start, request.date_range.end)?;
        let nights = request.nights()?;
        let property = self.searchable_property(request.property_id).await?;

        let mut tx = self.db.begin().await?;
        let pending = job_queries::create_job(
            &mut tx,
            property.id,
            property.hotel_id,
            range,
            request.search_type,
            nights,
        )
        .await?;

        match job_queries::start_job(&mut tx, pending.id).await? {
            StartOutcome::Started(job) => {
                tx.commit().await?;
                metrics::counter!("search_jobs_created_total").increment(1);
                metrics::counter!("search_jobs_started_total").increment(1);
                info!(job_id = %job.id, property_id = job.property_id, "Search launched");
                Ok(job)
            }
            StartOutcome::AdmissionDenied => {
                tx.rollback().await?;
                metrics::counter!("search_jobs_admission_denied_total").increment(1);
                warn!(
                    property_id = property.id,
                    "Search launch denied, property already has a running search"
                );
                Err(EngineError::AdmissionDenied {
                    property_id: property.id,
                })
            }
            StartOutcome::NotPending => {
                tx.rollback().await?;
                Err(EngineError::StateConflict {
                    job_id: pending.id,
                    status: pending.status,
                    action: "start",
                })
            }
        }
    }

    /// Add to the counters of a running search.
    pub async fn advance(
        &self,
        job_id: Uuid,
        processed_delta: i32,
        prices_found_delta: i32,
    ) -> Result<SearchJob, EngineError> {
        if processed_delta < 0 || prices_found_delta < 0 {
            return Err(EngineError::Validation(format!(
                "progress deltas must be non-negative (processed={}, prices={})",
                processed_delta, prices_found_delta
            )));
        }

        match job_queries::advance_job(&self.db, job_id, processed_delta, prices_found_delta).await? {
            Some(job) => {
                debug!(
                    job_id = %job_id,
                    processed = job.processed_dates,
                    total = job.total_dates,
                    prices = job.total_prices_found,
                    "Search advanced"
                );
                Ok(job)
            }
            None => Err(self.conflict(job_id, "advance").await),
        }
    }

    /// RUNNING → COMPLETED. No-op if already terminal.
    pub async fn complete(&self, job_id: Uuid) -> Result<SearchJob, EngineError> {
        let updated = job_queries::finish_job(
            &self.db,
            job_id,
            SearchStatus::Completed,
            &[SearchStatus::Running],
            None,
        )
        .await?;

        match updated {
            Some(job) => {
                metrics::counter!("search_jobs_completed_total").increment(1);
                info!(
                    job_id = %job.id,
                    processed = job.processed_dates,
                    prices = job.total_prices_found,
                    "Search completed"
                );
                Ok(job)
            }
            None => self.already_terminal(job_id, "complete").await,
        }
    }

    /// → FAILED with an error log. On an already failed search only the
    /// error log is replaced; other terminal states are left untouched.
    pub async fn fail(&self, job_id: Uuid, error: &str) -> Result<SearchJob, EngineError> {
        let updated = job_queries::finish_job(
            &self.db,
            job_id,
            SearchStatus::Failed,
            &[SearchStatus::Pending, SearchStatus::Running],
            Some(error),
        )
        .await?;

        match updated {
            Some(job) => {
                metrics::counter!("search_jobs_failed_total").increment(1);
                warn!(job_id = %job.id, error = %error, "Search failed");
                Ok(job)
            }
            None => {
                let job = self.get(job_id).await?;
                if job.status == SearchStatus::Failed {
                    job_queries::update_error_log(&self.db, job_id, error).await?;
                    return self.get(job_id).await;
                }
                debug!(job_id = %job_id, status = %job.status, "Ignoring fail signal for finished search");
                Ok(job)
            }
        }
    }

    /// → CANCELLED. The worker observes this at its next checkpoint.
    pub async fn cancel(&self, job_id: Uuid) -> Result<SearchJob, EngineError> {
        let updated = job_queries::finish_job(
            &self.db,
            job_id,
            SearchStatus::Cancelled,
            &[SearchStatus::Pending, SearchStatus::Running],
            None,
        )
        .await?;

        match updated {
            Some(job) => {
                metrics::counter!("search_jobs_cancelled_total").increment(1);
                info!(job_id = %job.id, "Search cancelled");
                Ok(job)
            }
            None => self.already_terminal(job_id, "cancel").await,
        }
    }

    /// Load a search and require it to be RUNNING.
    pub async fn require_running(&self, job_id: Uuid, action: &'static str) -> Result<SearchJob, EngineError> {
        let job = self.get(job_id).await?;
        if job.status != SearchStatus::Running {
            return Err(EngineError::StateConflict {
                job_id,
                status: job.status,
                action,
            });
        }
        Ok(job)
    }

    async fn searchable_property(&self, property_id: i64) -> Result<Property, EngineError> {
        let property = property_queries::get_property(&self.db, property_id)
            .await?
            .ok_or_else(|| EngineError::property_not_found(property_id))?;
        if !property.active {
            return Err(EngineError::Validation(format!(
                "property {} is inactive",
                property_id
            )));
        }
        Ok(property)
    }

    async fn already_terminal(&self, job_id: Uuid, action: &'static str) -> Result<SearchJob, EngineError> {
        let job = self.get(job_id).await?;
        if job.status.is_terminal() {
            debug!(job_id = %job_id, status = %job.status, action, "Duplicate terminal signal ignored");
            return Ok(job);
        }
        Err(EngineError::StateConflict {
            job_id,
            status: job.status,
            action,
        })
    }

    async fn conflict(&self, job_id: Uuid, action: &'static str) -> EngineError {
        match self.get(job_id).await {
            Ok(job) => EngineError::StateConflict {
                job_id,
                status: job.status,
                action,
            },
            Err(e) => e,
        }
    }
}
