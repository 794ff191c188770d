use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::EngineError;
use crate::models::analytics::{ChartResponse, TrendQuery};
use crate::models::history::PriceHistoryEntry;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/v1/hotels/{hotel_id}/price-trend?start=&end=&future_days=
pub async fn price_trend(
    State(state): State<AppState>,
    Path(hotel_id): Path<i64>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<ChartResponse>, EngineError> {
    Ok(Json(state.analytics.chart(hotel_id, &query).await?))
}

/// GET /api/v1/properties/{property_id}/history?from=&to=
///
/// Defaults to check-in dates from 30 days ago to 90 days ahead.
pub async fn price_history(
    State(state): State<AppState>,
    Path(property_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PriceHistoryEntry>>, EngineError> {
    let today = Utc::now().date_naive();
    let from = query.from.unwrap_or(today - Duration::days(30));
    let to = query.to.unwrap_or(today + Duration::days(90));
    Ok(Json(state.history.list(property_id, from, to).await?))
}
