use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::EngineError;
use crate::models::job::{NewSearch, SearchJob, SearchStatus};
use crate::models::observation::IngestReport;
use crate::models::progress::{JobProgress, ProgressSnapshot, SearchDetail};
use crate::services::ingestion::IngestBatch;
use crate::services::queue::QueuedSearch;

/// Response after submitting a search.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub job_id: Uuid,
    pub status: SearchStatus,
    pub total_dates: i32,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    #[serde(default)]
    pub processed_dates_delta: i32,
    #[serde(default)]
    pub prices_found_delta: i32,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub error: String,
}

/// POST /api/v1/searches
///
/// Queue a search for the worker.
pub async fn create_search(
    State(state): State<AppState>,
    Json(request): Json<NewSearch>,
) -> Result<(StatusCode, Json<SearchResponse>), EngineError> {
    let job = state.jobs.create(&request).await?;

    let queued = QueuedSearch {
        job_id: job.id,
        property_id: job.property_id,
    };
    if let Err(e) = state.queue.enqueue(&queued).await {
        tracing::error!(job_id = %job.id, error = %e, "Failed to enqueue search");
        let job = state
            .jobs
            .fail(job.id, &format!("could not enqueue search: {}", e))
            .await?;
        return Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SearchResponse {
                job_id: job.id,
                status: job.status,
                total_dates: job.total_dates,
                message: "Search queue unavailable".to_string(),
            }),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SearchResponse {
            job_id: job.id,
            status: job.status,
            total_dates: job.total_dates,
            message: "Search queued".to_string(),
        }),
    ))
}

/// POST /api/v1/searches/launch
///
/// Start signal from an external worker:
/// creates and starts a search in one step.
pub async fn launch_search(
    State(state): State<AppState>,
    Json(request): Json<NewSearch>,
) -> Result<(StatusCode, Json<SearchJob>), EngineError> {
    let job = state.jobs.launch(&request).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/searches/progress
///
/// Dashboard polling snapshot.
pub async fn progress_snapshot(State(state): State<AppState>) -> Result<Json<ProgressSnapshot>, EngineError> {
    Ok(Json(state.progress.snapshot().await?))
}

/// GET /api/v1/searches/{job_id}
pub async fn search_detail(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SearchDetail>, EngineError> {
    Ok(Json(state.progress.detail(job_id).await?))
}

/// GET /api/v1/searches/{job_id}/progress
pub async fn search_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobProgress>, EngineError> {
    Ok(Json(state.progress.progress(job_id).await?))
}

/// POST /api/v1/searches/{job_id}/start
pub async fn start_search(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SearchJob>, EngineError> {
    Ok(Json(state.jobs.start(job_id).await?))
}

/// POST /api/v1/searches/{job_id}/advance
pub async fn advance_search(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<SearchJob>, EngineError> {
    let job = state
        .jobs
        .advance(job_id, request.processed_dates_delta, request.prices_found_delta)
        .await?;
    Ok(Json(job))
}

/// POST /api/v1/searches/{job_id}/complete
pub async fn complete_search(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SearchJob>, EngineError> {
    Ok(Json(state.jobs.complete(job_id).await?))
}

/// POST /api/v1/searches/{job_id}/fail
pub async fn fail_search(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(request): Json<FailRequest>,
) -> Result<Json<SearchJob>, EngineError> {
    Ok(Json(state.jobs.fail(job_id, &request.error).await?))
}

/// POST /api/v1/searches/{job_id}/cancel
pub async fn cancel_search(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<SearchJob>, EngineError> {
    Ok(Json(state.jobs.cancel(job_id).await?))
}

/// POST /api/v1/searches/{job_id}/prices
///
/// Ingest a batch of scraped rows.
pub async fn ingest_prices(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    Json(batch): Json<IngestBatch>,
) -> Result<Json<IngestReport>, EngineError> {
    Ok(Json(state.ingestor.ingest_batch(job_id, &batch).await?))
}
