use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{SearchJob, SearchStatus};
use crate::models::observation::{PriceObservation, PriceStats};

/// Remaining-time estimate for a search.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Eta {
    /// No date has been processed yet.
    Calculating,
    Estimated { seconds: i64 },
    Done,
}

/// Point-in-time progress of one search, derived on each poll.
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub property_id: i64,
    pub property_name: Option<String>,
    pub status: SearchStatus,
    pub processed_dates: i32,
    pub total_dates: i32,
    pub total_prices_found: i32,
    pub progress_percent: u8,
    pub elapsed_seconds: i64,
    pub eta: Eta,
    pub throughput: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_log: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProgressStats {
    pub running_count: i64,
    pub pending_count: i64,
    pub completed_today: i64,
    pub failed_today: i64,
}

/// Polling payload for the progress dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub running_searches: Vec<JobProgress>,
    pub recent_completed: Vec<JobProgress>,
    pub stats: ProgressStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchDetail {
    pub job: SearchJob,
    pub progress: JobProgress,
    pub observations: Vec<PriceObservation>,
    pub stats: PriceStats,
}
