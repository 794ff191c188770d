//! Database-backed tests for the search lifecycle, ingestion, analytics and
//! sync. They need a PostgreSQL instance reachable through DATABASE_URL.
//!
//! Run with: cargo test --test integration_test -- --ignored

use chrono::{Duration, NaiveDate, Utc};
use rate_scout::{
    db::{self, property_queries, sync_queries},
    error::EngineError,
    models::{
        analytics::TrendQuery,
        job::{DateRange, NewSearch, SearchStatus, SearchType},
        observation::RawPriceRow,
        progress::Eta,
        property::Property,
    },
    services::{
        analytics::AnalyticsAggregator,
        history::PriceHistoryRecorder,
        ingestion::{IngestBatch, PriceIngestor},
        jobs::JobStateMachine,
        progress::ProgressTracker,
        sync::SyncMapper,
        watchdog::Watchdog,
    },
};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

struct Engine {
    pool: PgPool,
    jobs: JobStateMachine,
    progress: ProgressTracker,
    ingestor: PriceIngestor,
    history: PriceHistoryRecorder,
    analytics: AnalyticsAggregator,
}

async fn engine() -> Engine {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::init_pool(&url).await.expect("Failed to connect to database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");

    let jobs = JobStateMachine::new(pool.clone());
    let history = PriceHistoryRecorder::new(pool.clone());
    let ingestor = PriceIngestor::new(pool.clone(), jobs.clone(), history.clone());
    let analytics = AnalyticsAggregator::new(pool.clone(), 30);

    Engine {
        progress: ProgressTracker::new(pool.clone()),
        pool,
        jobs,
        ingestor,
        history,
        analytics,
    }
}

/// A hotel id no other test run uses.
fn fresh_hotel_id() -> i64 {
    (Uuid::new_v4().as_u128() % 1_000_000_000) as i64 + 1_000
}

async fn seed_property(pool: &PgPool, hotel_id: i64, name: &str, is_main: bool) -> Property {
    property_queries::insert_property(
        pool,
        hotel_id,
        name,
        &format!("https://www.airbnb.com.br/rooms/{}", Uuid::new_v4()),
        "airbnb",
        is_main,
    )
    .await
    .expect("Failed to insert property")
}

fn daily_search(property_id: i64, start: NaiveDate, end: NaiveDate) -> NewSearch {
    NewSearch {
        property_id,
        date_range: DateRange::new(start, end).unwrap(),
        search_type: SearchType::Daily,
        bundle_nights: None,
    }
}

fn price_row(check_in: NaiveDate, price: serde_json::Value) -> RawPriceRow {
    RawPriceRow {
        check_in_date: Some(check_in.to_string()),
        price: Some(price),
        ..Default::default()
    }
}

fn batch(rows: Vec<RawPriceRow>, scraped_at: chrono::DateTime<Utc>) -> IngestBatch {
    IngestBatch {
        rows,
        scraped_at: Some(scraped_at),
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_one_running_search_per_property() {
    let engine = engine().await;
    let hotel_id = fresh_hotel_id();
    let property = seed_property(&engine.pool, hotel_id, "Pousada Mar Azul", true).await;
    let today = Utc::now().date_naive();

    let first = engine
        .jobs
        .create(&daily_search(property.id, today, today + Duration::days(3)))
        .await
        .expect("create first");
    let second = engine
        .jobs
        .create(&daily_search(property.id, today, today + Duration::days(3)))
        .await
        .expect("create second");
    assert_eq!(first.status, SearchStatus::Pending);
    assert_eq!(first.total_dates, 4);

    let started = engine.jobs.start(first.id).await.expect("start first");
    assert_eq!(started.status, SearchStatus::Running);
    assert!(started.started_at.is_some());

    match engine.jobs.start(second.id).await {
        Err(EngineError::AdmissionDenied { property_id }) => assert_eq!(property_id, property.id),
        other => panic!("expected admission denial, got {:?}", other.map(|j| j.status)),
    }
    assert_eq!(
        engine.jobs.get(second.id).await.unwrap().status,
        SearchStatus::Pending
    );

    // Launch is denied too and leaves no row behind
    let launch = engine
        .jobs
        .launch(&daily_search(property.id, today, today))
        .await;
    assert!(matches!(launch, Err(EngineError::AdmissionDenied { .. })));

    let running = rate_scout::db::job_queries::list_jobs_by_status(&engine.pool, SearchStatus::Running, 1_000)
        .await
        .unwrap()
        .into_iter()
        .filter(|j| j.property_id == property.id)
        .count();
    assert_eq!(running, 1);

    // Once the first finishes the second may start
    engine.jobs.complete(first.id).await.expect("complete first");
    let second = engine.jobs.start(second.id).await.expect("start second");
    assert_eq!(second.status, SearchStatus::Running);
    engine.jobs.cancel(second.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_starts_admit_one() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Refúgio Concorrido", true).await;
    let today = Utc::now().date_naive();

    let mut ids = Vec::new();
    for _ in 0..5 {
        let job = engine
            .jobs
            .create(&daily_search(property.id, today, today))
            .await
            .unwrap();
        ids.push(job.id);
    }

    let tasks: Vec<_> = ids.iter().map(|id| engine.jobs.start(*id)).collect();
    let results = futures::future::join_all(tasks).await;

    let started: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let denied = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::AdmissionDenied { .. })))
        .count();
    assert_eq!(started.len(), 1);
    assert_eq!(denied, 4);

    engine.jobs.cancel(started[0].id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_advance_requires_running_and_clamps() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Chalé da Serra", true).await;
    let today = Utc::now().date_naive();

    let job = engine
        .jobs
        .create(&daily_search(property.id, today, today + Duration::days(1)))
        .await
        .unwrap();

    let err = engine.jobs.advance(job.id, 1, 3).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::StateConflict {
            status: SearchStatus::Pending,
            ..
        }
    ));

    engine.jobs.start(job.id).await.unwrap();
    let err = engine.jobs.advance(job.id, -1, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let advanced = engine.jobs.advance(job.id, 5, 7).await.unwrap();
    assert_eq!(advanced.processed_dates, advanced.total_dates);
    assert_eq!(advanced.total_prices_found, 7);
    assert!(advanced.last_progress_at.is_some());

    engine.jobs.cancel(job.id).await.unwrap();
    let err = engine.jobs.advance(job.id, 1, 0).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::StateConflict {
            status: SearchStatus::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_terminal_signals_are_idempotent() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Villa Atlântica", true).await;
    let today = Utc::now().date_naive();

    let pending = engine
        .jobs
        .create(&daily_search(property.id, today, today))
        .await
        .unwrap();
    let err = engine.jobs.complete(pending.id).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict { action: "complete", .. }));

    engine.jobs.start(pending.id).await.unwrap();
    let done = engine.jobs.complete(pending.id).await.unwrap();
    assert_eq!(done.status, SearchStatus::Completed);
    let completed_at = done.completed_at;

    let again = engine.jobs.complete(pending.id).await.unwrap();
    assert_eq!(again.status, SearchStatus::Completed);
    assert_eq!(again.completed_at, completed_at);

    // Late cancel and fail leave a completed search alone
    assert_eq!(
        engine.jobs.cancel(pending.id).await.unwrap().status,
        SearchStatus::Completed
    );
    let after_fail = engine.jobs.fail(pending.id, "late failure").await.unwrap();
    assert_eq!(after_fail.status, SearchStatus::Completed);
    assert!(after_fail.error_log.is_none());

    // A second fail only replaces the error log
    let other = engine
        .jobs
        .create(&daily_search(property.id, today, today))
        .await
        .unwrap();
    engine.jobs.fail(other.id, "extractor timeout").await.unwrap();
    let refailed = engine.jobs.fail(other.id, "extractor blocked").await.unwrap();
    assert_eq!(refailed.status, SearchStatus::Failed);
    assert_eq!(refailed.error_log.as_deref(), Some("extractor blocked"));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_duplicate_rows_are_stored_once() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Hotel Beira Rio", true).await;
    let check_in = Utc::now().date_naive() + Duration::days(5);

    let job = engine
        .jobs
        .launch(&daily_search(property.id, check_in, check_in))
        .await
        .unwrap();

    let scraped_at = Utc::now();
    let rows = vec![
        price_row(check_in, json!(420)),
        price_row(check_in, json!("R$ 430,00")),
        price_row(check_in + Duration::days(9), json!(400)),
        price_row(check_in, json!("sold out")),
    ];
    let report = engine
        .ingestor
        .ingest_batch(job.id, &batch(rows, scraped_at))
        .await
        .unwrap();

    assert_eq!(report.received, 4);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.rejected[0].index, 2);

    let retry = engine
        .ingestor
        .ingest_batch(job.id, &batch(vec![price_row(check_in, json!(420))], scraped_at))
        .await
        .unwrap();
    assert_eq!(retry.inserted, 0);
    assert_eq!(retry.duplicates, 1);

    let stored = rate_scout::db::observation_queries::count_for_search(&engine.pool, job.id)
        .await
        .unwrap();
    assert_eq!(stored, 1);

    engine.jobs.complete(job.id).await.unwrap();
    let err = engine
        .ingestor
        .ingest_batch(job.id, &batch(vec![price_row(check_in, json!(500))], Utc::now()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict { .. }));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_price_change_is_recorded() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Pousada do Farol", true).await;
    let check_in = Utc::now().date_naive() + Duration::days(12);

    let job = engine
        .jobs
        .launch(&daily_search(property.id, check_in, check_in))
        .await
        .unwrap();

    let first_scrape = Utc::now() - Duration::hours(2);
    engine
        .ingestor
        .ingest_batch(job.id, &batch(vec![price_row(check_in, json!(350))], first_scrape))
        .await
        .unwrap();
    // Same price again: no new history entry
    let unchanged = engine
        .ingestor
        .ingest_batch(
            job.id,
            &batch(vec![price_row(check_in, json!(350))], first_scrape + Duration::minutes(30)),
        )
        .await
        .unwrap();
    assert_eq!(unchanged.inserted, 1);
    assert_eq!(unchanged.history_entries, 0);

    let changed = engine
        .ingestor
        .ingest_batch(job.id, &batch(vec![price_row(check_in, json!(380))], Utc::now()))
        .await
        .unwrap();
    assert_eq!(changed.history_entries, 1);

    let entries = engine
        .history
        .list(property.id, check_in, check_in)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    let latest = entries
        .iter()
        .find(|e| e.previous_price.is_some())
        .expect("change entry");
    assert_eq!(latest.price, Decimal::new(380, 0));
    assert_eq!(latest.previous_price, Some(Decimal::new(350, 0)));
    assert_eq!(latest.change_percentage, Some(Decimal::new(857, 2)));

    engine.jobs.complete(job.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_trend_leaves_missing_dates_null() {
    let engine = engine().await;
    let hotel_id = fresh_hotel_id();
    let main = seed_property(&engine.pool, hotel_id, "Casa Principal", true).await;
    let competitor = seed_property(&engine.pool, hotel_id, "Competidor", false).await;

    let today = Utc::now().date_naive();
    let start = today - Duration::days(10);
    let end = today - Duration::days(8);

    let job = engine
        .jobs
        .launch(&daily_search(main.id, start, end))
        .await
        .unwrap();
    let first_scrape = Utc::now() - Duration::hours(1);
    engine
        .ingestor
        .ingest_batch(
            job.id,
            &batch(vec![price_row(start, json!(300)), price_row(end, json!(450))], first_scrape),
        )
        .await
        .unwrap();
    engine
        .ingestor
        .ingest_batch(job.id, &batch(vec![price_row(start, json!(500))], Utc::now()))
        .await
        .unwrap();
    engine.jobs.complete(job.id).await.unwrap();

    let trend = engine
        .analytics
        .price_trend(
            hotel_id,
            &TrendQuery {
                start,
                end,
                future_days: Some(0),
            },
        )
        .await
        .unwrap();

    assert_eq!(trend.properties.len(), 2);
    assert_eq!(trend.properties[0].id, main.id);
    assert_eq!(trend.properties[1].id, competitor.id);

    let points = &trend.historical.points;
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|p| !p.is_future && !p.is_today));

    let first = points[0].values[0].as_ref().expect("stats for first date");
    assert_eq!(first.count, 2);
    assert_eq!(first.min, Some(Decimal::new(300, 0)));
    assert_eq!(first.max, Some(Decimal::new(500, 0)));
    assert_eq!(first.avg, Some(Decimal::new(400, 0)));

    assert!(points[1].values[0].is_none(), "no quotes means null, not zero");
    assert!(points[2].values[0].is_some());
    assert!(points.iter().all(|p| p.values[1].is_none()));
    assert!(trend.future.points.is_empty());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_sync_full_replace_is_repeatable() {
    let engine = engine().await;
    let source_hotel = fresh_hotel_id();
    let dest_hotel = fresh_hotel_id();

    let source_main = seed_property(&engine.pool, source_hotel, "Pousada Sol", true).await;
    seed_property(&engine.pool, source_hotel, "Only In Source", false).await;
    let dest_main = seed_property(&engine.pool, dest_hotel, "Pousada Sol", true).await;

    let check_in = Utc::now().date_naive() + Duration::days(3);
    let job = engine
        .jobs
        .launch(&daily_search(source_main.id, check_in, check_in + Duration::days(1)))
        .await
        .unwrap();
    engine
        .ingestor
        .ingest_batch(
            job.id,
            &batch(
                vec![
                    price_row(check_in, json!(200)),
                    price_row(check_in + Duration::days(1), json!(220)),
                ],
                Utc::now(),
            ),
        )
        .await
        .unwrap();
    engine.jobs.advance(job.id, 2, 2).await.unwrap();
    engine.jobs.complete(job.id).await.unwrap();

    // Source and destination share a database here; hotels keep them apart.
    let mapper = SyncMapper::new(engine.pool.clone(), engine.pool.clone());

    let first = mapper.run(source_hotel, dest_hotel).await.unwrap();
    assert_eq!(first.inserted.search_jobs, 1);
    assert_eq!(first.inserted.price_observations, 2);
    assert_eq!(first.inserted.price_history, 2);
    assert_eq!(first.unmapped.len(), 1);
    assert_eq!(first.unmapped[0].name, "Only In Source");

    let second = mapper.run(source_hotel, dest_hotel).await.unwrap();
    assert_eq!(second.inserted, first.inserted);
    assert_eq!(second.deleted, first.inserted);

    let dest_ids = vec![dest_main.id];
    let jobs = sync_queries::jobs_for_properties(&engine.pool, &dest_ids).await.unwrap();
    let observations = sync_queries::observations_for_properties(&engine.pool, &dest_ids)
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].hotel_id, dest_hotel);
    assert_ne!(jobs[0].id, job.id);
    assert_eq!(observations.len(), 2);
    assert!(observations.iter().all(|o| o.search_id == jobs[0].id));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_ten_date_search_reports_progress() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Pousada Progresso", true).await;
    let start = Utc::now().date_naive() + Duration::days(30);

    let job = engine
        .jobs
        .launch(&daily_search(property.id, start, start + Duration::days(9)))
        .await
        .unwrap();
    let initial = engine.progress.progress(job.id).await.unwrap();
    assert_eq!(initial.progress_percent, 0);
    assert_eq!(initial.eta, Eta::Calculating);

    let mut last_percent = initial.progress_percent;
    for _ in 0..4 {
        engine.jobs.advance(job.id, 1, 3).await.unwrap();
        let progress = engine.progress.progress(job.id).await.unwrap();
        assert!(progress.progress_percent >= last_percent);
        last_percent = progress.progress_percent;
    }

    let progress = engine.progress.progress(job.id).await.unwrap();
    assert_eq!(progress.status, SearchStatus::Running);
    assert_eq!(progress.progress_percent, 40);
    assert_eq!(progress.processed_dates, 4);
    assert_eq!(progress.total_prices_found, 12);
    assert_eq!(progress.property_name.as_deref(), Some("Pousada Progresso"));
    match progress.eta {
        Eta::Estimated { seconds } => assert!(seconds >= 0),
        other => panic!("expected an estimate, got {:?}", other),
    }

    let snapshot = engine.progress.snapshot().await.unwrap();
    assert!(snapshot.running_searches.iter().any(|p| p.job_id == job.id));

    engine.jobs.complete(job.id).await.unwrap();
    let done = engine.progress.progress(job.id).await.unwrap();
    assert_eq!(done.eta, Eta::Done);
    assert!(done.progress_percent >= last_percent);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_watchdog_fails_silent_search() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Hostel Silencioso", true).await;
    let today = Utc::now().date_naive();

    let job = engine
        .jobs
        .launch(&daily_search(property.id, today, today + Duration::days(2)))
        .await
        .unwrap();
    engine.jobs.advance(job.id, 1, 2).await.unwrap();

    // Only searches silent for over a day qualify, so other tests' fresh
    // searches are never swept.
    sqlx::query(
        "UPDATE search_jobs SET started_at = NOW() - INTERVAL '3 days', last_progress_at = NOW() - INTERVAL '2 days' WHERE id = $1",
    )
    .bind(job.id)
    .execute(&engine.pool)
    .await
    .unwrap();

    let watchdog = Watchdog::new(engine.pool.clone(), engine.jobs.clone(), Duration::days(1));
    let failed = watchdog.sweep().await.unwrap();
    assert!(failed >= 1);

    let swept = engine.jobs.get(job.id).await.unwrap();
    assert_eq!(swept.status, SearchStatus::Failed);
    assert!(swept.completed_at.is_some());
    let error_log = swept.error_log.expect("stall reason recorded");
    assert!(error_log.contains("stalled"), "error_log was {:?}", error_log);
    assert!(error_log.contains("1/3 dates"));

    // The property is free again
    let next = engine
        .jobs
        .launch(&daily_search(property.id, today, today))
        .await
        .unwrap();
    engine.jobs.cancel(next.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_oversized_price_does_not_abort_batch() {
    let engine = engine().await;
    let property = seed_property(&engine.pool, fresh_hotel_id(), "Resort Caro", true).await;
    let check_in = Utc::now().date_naive() + Duration::days(40);

    let job = engine
        .jobs
        .launch(&daily_search(property.id, check_in, check_in + Duration::days(1)))
        .await
        .unwrap();

    let report = engine
        .ingestor
        .ingest_batch(
            job.id,
            &batch(
                vec![
                    price_row(check_in, json!("R$ 99.999.999.999,00")),
                    price_row(check_in + Duration::days(1), json!(300)),
                ],
                Utc::now(),
            ),
        )
        .await
        .unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].index, 0);

    let stored = rate_scout::db::observation_queries::count_for_search(&engine.pool, job.id)
        .await
        .unwrap();
    assert_eq!(stored, 1);

    // The largest storable price after a one-cent quote still gets its history entry
    let tiny = engine
        .ingestor
        .ingest_batch(
            job.id,
            &batch(vec![price_row(check_in, json!("0,01"))], Utc::now() - Duration::minutes(5)),
        )
        .await
        .unwrap();
    assert_eq!(tiny.history_entries, 1);
    let huge = engine
        .ingestor
        .ingest_batch(
            job.id,
            &batch(vec![price_row(check_in, json!("R$ 9.999.999.999,99"))], Utc::now()),
        )
        .await
        .unwrap();
    assert_eq!(huge.inserted, 1);
    assert_eq!(huge.history_entries, 1);

    let entries = engine
        .history
        .list(property.id, check_in, check_in)
        .await
        .unwrap();
    let rise = entries
        .iter()
        .find(|e| e.previous_price == Some(Decimal::new(1, 2)))
        .expect("rise entry");
    assert!(rise.change_percentage.unwrap() > Decimal::new(10_i64.pow(13), 0));

    engine.jobs.complete(job.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_trend_accepts_old_historical_window() {
    let engine = engine().await;
    let hotel_id = fresh_hotel_id();
    let property = seed_property(&engine.pool, hotel_id, "Pousada Antiga", true).await;

    let today = Utc::now().date_naive();
    let start = today - Duration::days(500);
    let end = today - Duration::days(490);

    let job = engine
        .jobs
        .launch(&daily_search(property.id, start, end))
        .await
        .unwrap();
    engine
        .ingestor
        .ingest_batch(job.id, &batch(vec![price_row(start, json!(280))], Utc::now()))
        .await
        .unwrap();
    engine.jobs.complete(job.id).await.unwrap();

    let trend = engine
        .analytics
        .price_trend(
            hotel_id,
            &TrendQuery {
                start,
                end,
                future_days: Some(0),
            },
        )
        .await
        .unwrap();
    assert_eq!(trend.historical.points.len(), 11);
    assert_eq!(
        trend.historical.points[0].values[0].as_ref().and_then(|s| s.avg),
        Some(Decimal::new(280, 0))
    );

    let too_wide = engine
        .analytics
        .price_trend(
            hotel_id,
            &TrendQuery {
                start: today - Duration::days(500),
                end: today,
                future_days: Some(0),
            },
        )
        .await;
    assert!(matches!(too_wide, Err(EngineError::Validation(_))));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn test_sync_keeps_native_rows_and_parks_open_jobs() {
    let engine = engine().await;
    let source_hotel = fresh_hotel_id();
    let dest_hotel = fresh_hotel_id();

    let source_main = seed_property(&engine.pool, source_hotel, "Pousada Lua", true).await;
    let dest_main = seed_property(&engine.pool, dest_hotel, "Pousada Lua", true).await;
    let check_in = Utc::now().date_naive() + Duration::days(15);

    // Still running in the source when the sync happens
    let open = engine
        .jobs
        .launch(&daily_search(source_main.id, check_in, check_in))
        .await
        .unwrap();
    engine
        .ingestor
        .ingest_batch(open.id, &batch(vec![price_row(check_in, json!(310))], Utc::now()))
        .await
        .unwrap();

    // Running natively in the destination
    let native = engine
        .jobs
        .launch(&daily_search(dest_main.id, check_in, check_in))
        .await
        .unwrap();
    engine
        .ingestor
        .ingest_batch(
            native.id,
            &batch(vec![price_row(check_in, json!(330))], Utc::now() - Duration::hours(1)),
        )
        .await
        .unwrap();

    let mapper = SyncMapper::new(engine.pool.clone(), engine.pool.clone());
    let first = mapper.run(source_hotel, dest_hotel).await.unwrap();
    let second = mapper.run(source_hotel, dest_hotel).await.unwrap();
    assert_eq!(first.inserted.search_jobs, 1);
    assert_eq!(second.inserted, first.inserted);
    assert_eq!(second.deleted, first.inserted);

    let native_after = engine.jobs.get(native.id).await.unwrap();
    assert_eq!(native_after.status, SearchStatus::Running);
    let native_rows = rate_scout::db::observation_queries::count_for_search(&engine.pool, native.id)
        .await
        .unwrap();
    assert_eq!(native_rows, 1);

    let dest_jobs = sync_queries::jobs_for_properties(&engine.pool, &[dest_main.id])
        .await
        .unwrap();
    assert_eq!(dest_jobs.len(), 2);
    let copied = dest_jobs
        .iter()
        .find(|j| j.id != native.id)
        .expect("replicated job");
    assert_eq!(copied.status, SearchStatus::Cancelled);
    assert!(copied.error_log.is_some());

    engine.jobs.cancel(open.id).await.unwrap();
    engine.jobs.cancel(native.id).await.unwrap();
}
