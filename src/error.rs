use uuid::Uuid;

use crate::models::job::SearchStatus;

/// Failure taxonomy shared by the job, ingestion, analytics and sync components.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed input. During batch ingestion this is recorded per row and the
    /// batch continues.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("search {job_id} cannot {action} while {status}")]
    StateConflict {
        job_id: Uuid,
        status: SearchStatus,
        action: &'static str,
    },

    #[error("property {property_id} already has a running search")]
    AdmissionDenied { property_id: i64 },

    #[error("source property {source_property_id} ({name}) has no destination counterpart")]
    UnmappedReference {
        source_property_id: i64,
        name: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl EngineError {
    pub fn search_not_found(job_id: Uuid) -> Self {
        EngineError::NotFound {
            entity: "search",
            id: job_id.to_string(),
        }
    }

    pub fn property_not_found(property_id: i64) -> Self {
        EngineError::NotFound {
            entity: "property",
            id: property_id.to_string(),
        }
    }
}

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Name of the partial index that allows one RUNNING search per property.
pub const ONE_RUNNING_INDEX: &str = "uq_search_jobs_one_running_per_property";

/// True when `err` was raised by the single-running-search index.
pub fn is_admission_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db.constraint() == Some(ONE_RUNNING_INDEX)
        }
        _ => false,
    }
}
