use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{
    analytics::AnalyticsAggregator, history::PriceHistoryRecorder, ingestion::PriceIngestor,
    jobs::JobStateMachine, progress::ProgressTracker, queue::JobQueue,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<JobQueue>,
    pub jobs: JobStateMachine,
    pub progress: ProgressTracker,
    pub ingestor: PriceIngestor,
    pub history: PriceHistoryRecorder,
    pub analytics: AnalyticsAggregator,
}

impl AppState {
    pub fn new(db: PgPool, queue: JobQueue, future_days: u32) -> Self {
        let jobs = JobStateMachine::new(db.clone());
        let history = PriceHistoryRecorder::new(db.clone());
        Self {
            queue: Arc::new(queue),
            progress: ProgressTracker::new(db.clone()),
            ingestor: PriceIngestor::new(db.clone(), jobs.clone(), history.clone()),
            analytics: AnalyticsAggregator::new(db.clone(), future_days),
            jobs,
            history,
            db,
        }
    }
}
