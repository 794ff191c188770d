use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: Check,
    pub search_queue: QueueCheck,
}

#[derive(Serialize)]
pub struct Check {
    pub ok: bool,
    pub latency_ms: Option<u64>,
}

impl Check {
    fn timed<T, E>(result: &Result<T, E>, started: Instant) -> Self {
        Self {
            ok: result.is_ok(),
            latency_ms: result.as_ref().ok().map(|_| started.elapsed().as_millis() as u64),
        }
    }
}

#[derive(Serialize)]
pub struct QueueCheck {
    #[serde(flatten)]
    pub check: Check,
    /// Searches waiting for a worker, when Redis answered.
    pub waiting: Option<u64>,
}

/// GET /health
///
/// 200 when PostgreSQL and the Redis search queue both answer, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let started = Instant::now();
    let db_result = sqlx::query("SELECT 1").execute(&state.db).await;
    let database = Check::timed(&db_result, started);

    let started = Instant::now();
    let depth = state.queue.queue_depth().await;
    let search_queue = QueueCheck {
        check: Check::timed(&depth, started),
        waiting: depth.ok(),
    };

    let healthy = database.ok && search_queue.check.ok;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database,
            search_queue,
        }),
    )
}
