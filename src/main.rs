use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rate_scout::app_state::AppState;
use rate_scout::config::AppConfig;
use rate_scout::db;
use rate_scout::routes::{self, metrics::MetricsState};
use rate_scout::services::queue::JobQueue;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing rate-scout server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("search_jobs_created_total", "Searches created");
    metrics::describe_counter!("search_jobs_started_total", "Searches moved to RUNNING");
    metrics::describe_counter!(
        "search_jobs_admission_denied_total",
        "Start attempts rejected because the property already had a running search"
    );
    metrics::describe_counter!("search_jobs_completed_total", "Searches completed");
    metrics::describe_counter!("search_jobs_failed_total", "Searches failed");
    metrics::describe_counter!("search_jobs_cancelled_total", "Searches cancelled");
    metrics::describe_counter!(
        "price_observations_ingested_total",
        "Price observations stored"
    );
    metrics::describe_counter!(
        "price_observations_rejected_total",
        "Scraped rows rejected by validation"
    );
    metrics::describe_counter!(
        "search_jobs_stalled_total",
        "Running searches failed by the watchdog"
    );
    metrics::describe_gauge!("search_queue_depth", "Searches waiting for a worker");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize Redis search queue
    tracing::info!("Connecting to Redis search queue");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize search queue");

    // Create shared application state
    let state = AppState::new(db_pool, queue, config.future_days);
    let metrics_state = MetricsState {
        handle: prometheus_handle,
        queue: state.queue.clone(),
    };

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/searches", post(routes::searches::create_search))
        .route("/api/v1/searches/launch", post(routes::searches::launch_search))
        .route("/api/v1/searches/progress", get(routes::searches::progress_snapshot))
        .route("/api/v1/searches/{job_id}", get(routes::searches::search_detail))
        .route(
            "/api/v1/searches/{job_id}/progress",
            get(routes::searches::search_progress),
        )
        .route("/api/v1/searches/{job_id}/start", post(routes::searches::start_search))
        .route(
            "/api/v1/searches/{job_id}/advance",
            post(routes::searches::advance_search),
        )
        .route(
            "/api/v1/searches/{job_id}/complete",
            post(routes::searches::complete_search),
        )
        .route("/api/v1/searches/{job_id}/fail", post(routes::searches::fail_search))
        .route(
            "/api/v1/searches/{job_id}/cancel",
            post(routes::searches::cancel_search),
        )
        .route(
            "/api/v1/searches/{job_id}/prices",
            post(routes::searches::ingest_prices),
        )
        .route(
            "/api/v1/hotels/{hotel_id}/price-trend",
            get(routes::analytics::price_trend),
        )
        .route(
            "/api/v1/properties/{property_id}/history",
            get(routes::analytics::price_history),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(metrics_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024)); // 5 MB limit for price batches

    tracing::info!("Starting rate-scout on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
