use chrono::{NaiveDate, Utc};
use rate_scout::{
    app_state::AppState,
    config::AppConfig,
    db::{self, property_queries},
    error::EngineError,
    models::{
        job::{SearchJob, SearchStatus},
        observation::RawPriceRow,
        property::Property,
    },
    services::{
        extractor::{ExtractorClient, ExtractorError},
        ingestion::IngestBatch,
        queue::{JobQueue, QueuedSearch},
        watchdog::Watchdog,
    },
};
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const MAX_FETCH_ATTEMPTS: u32 = 3;
const MAX_CONSECUTIVE_DATE_FAILURES: u32 = 3;
const POLL_INTERVAL_MS: u64 = 1000; // 1 second
const ADMISSION_RETRY_DELAY_MS: u64 = 5000;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting rate-scout search worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize search queue");
    let extractor = ExtractorClient::new(&config.extractor_url, config.extractor_token.clone())
        .expect("Failed to initialize extraction client");

    let state = AppState::new(db_pool, queue, config.future_days);

    // Stalled-search watchdog
    let watchdog = Watchdog::new(
        state.db.clone(),
        state.jobs.clone(),
        chrono::Duration::seconds(config.stall_threshold_secs as i64),
    );
    let watchdog_interval = Duration::from_secs(config.watchdog_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(watchdog_interval);
        loop {
            ticker.tick().await;
            match watchdog.sweep().await {
                Ok(0) => tracing::trace!("Watchdog found no stalled searches"),
                Ok(n) => tracing::warn!(failed = n, "Watchdog failed stalled searches"),
                Err(e) => tracing::error!(error = %e, "Watchdog sweep failed"),
            }
        }
    });

    tracing::info!("Worker ready, starting search processing loop");

    // Main processing loop
    loop {
        match process_next_search(&state, &extractor).await {
            Ok(true) => {
                tracing::debug!("Search processed, checking for next search");
            }
            Ok(false) => {
                tracing::trace!("No searches available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing search, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next search from the queue.
/// Returns Ok(true) if a search was handled, Ok(false) if none was available.
async fn process_next_search(
    state: &AppState,
    extractor: &ExtractorClient,
) -> Result<bool, Box<dyn std::error::Error>> {
    let queued = match state.queue.dequeue().await? {
        Some(q) => q,
        None => return Ok(false),
    };

    tracing::info!(job_id = %queued.job_id, property_id = queued.property_id, "Picked up search");

    let job = match state.jobs.start(queued.job_id).await {
        Ok(job) => job,
        Err(EngineError::AdmissionDenied { property_id }) => {
            // Another search for this property is running; try again later.
            tracing::info!(job_id = %queued.job_id, property_id, "Property busy, re-queueing search");
            requeue(&state.queue, &queued).await?;
            sleep(Duration::from_millis(ADMISSION_RETRY_DELAY_MS)).await;
            return Ok(true);
        }
        Err(e @ EngineError::StateConflict { .. }) | Err(e @ EngineError::NotFound { .. }) => {
            tracing::info!(job_id = %queued.job_id, reason = %e, "Dropping search that can no longer start");
            state.queue.complete(&queued).await?;
            return Ok(true);
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = run_search(state, extractor, &job).await {
        tracing::error!(job_id = %job.id, error = %e, "Search aborted");
        state.jobs.fail(job.id, &e.to_string()).await?;
    }

    state.queue.complete(&queued).await?;
    Ok(true)
}

async fn requeue(queue: &JobQueue, queued: &QueuedSearch) -> Result<(), Box<dyn std::error::Error>> {
    queue.enqueue(queued).await?;
    queue.complete(queued).await?;
    Ok(())
}

/// Walk every check-in date of a running search, stopping early when it is
/// cancelled or otherwise leaves RUNNING.
async fn run_search(
    state: &AppState,
    extractor: &ExtractorClient,
    job: &SearchJob,
) -> Result<(), Box<dyn std::error::Error>> {
    let property = property_queries::get_property(&state.db, job.property_id)
        .await?
        .ok_or_else(|| EngineError::property_not_found(job.property_id))?;

    let mut consecutive_failures = 0;
    let mut failed_dates = Vec::new();

    for date in job.date_range.dates() {
        // Cooperative cancellation checkpoint
        let current = state.jobs.get(job.id).await?;
        if current.status != SearchStatus::Running {
            tracing::info!(job_id = %job.id, status = %current.status, "Search no longer running, stopping");
            return Ok(());
        }

        let rows = match fetch_with_retry(extractor, &property, date, job.bundle_nights).await {
            Ok(rows) => {
                consecutive_failures = 0;
                rows
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(job_id = %job.id, check_in = %date, error = %e, "No quotes for date");
                failed_dates.push(format!("{}: {}", date, e));
                if consecutive_failures >= MAX_CONSECUTIVE_DATE_FAILURES {
                    return Err(format!(
                        "extraction failed for {} consecutive dates; last: {}",
                        consecutive_failures, e
                    )
                    .into());
                }
                Vec::new()
            }
        };

        let batch = IngestBatch {
            rows,
            scraped_at: Some(Utc::now()),
        };
        let report = match state.ingestor.ingest_batch(job.id, &batch).await {
            Ok(report) => report,
            Err(EngineError::StateConflict { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        match state.jobs.advance(job.id, 1, report.inserted as i32).await {
            Ok(_) => {}
            Err(EngineError::StateConflict { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }

    let job = state.jobs.complete(job.id).await?;
    if !failed_dates.is_empty() {
        tracing::warn!(
            job_id = %job.id,
            failed_dates = failed_dates.len(),
            "Search completed with dates missing quotes"
        );
    }
    Ok(())
}

async fn fetch_with_retry(
    extractor: &ExtractorClient,
    property: &Property,
    date: NaiveDate,
    nights: i32,
) -> Result<Vec<RawPriceRow>, ExtractorError> {
    let mut attempt = 1;
    loop {
        match extractor.fetch_quotes(property, date, nights).await {
            Ok(rows) => return Ok(rows),
            Err(e) if attempt < MAX_FETCH_ATTEMPTS => {
                tracing::debug!(check_in = %date, attempt, error = %e, "Retrying quote fetch");
                sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
