pub mod analytics;
pub mod history;
pub mod job;
pub mod observation;
pub mod progress;
pub mod property;
pub mod sync;
