pub mod analytics;
pub mod extractor;
pub mod history;
pub mod ingestion;
pub mod jobs;
pub mod progress;
pub mod queue;
pub mod sync;
pub mod watchdog;
