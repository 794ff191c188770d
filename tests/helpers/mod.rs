//! Test helper utilities for E2E testing

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Search as returned by the signal endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchJobResponse {
    pub id: Uuid,
    pub property_id: i64,
    pub status: String,
    pub total_dates: i32,
    pub processed_dates: i32,
    pub total_prices_found: i32,
    pub error_log: Option<String>,
}

/// Response from POST /api/v1/searches
#[derive(Debug, Deserialize)]
pub struct QueuedSearchResponse {
    pub job_id: Uuid,
    pub status: String,
    pub total_dates: i32,
}

#[derive(Debug, Deserialize)]
pub struct ProgressResponse {
    pub job_id: Uuid,
    pub status: String,
    pub progress_percent: u8,
    pub processed_dates: i32,
    pub total_dates: i32,
    pub total_prices_found: i32,
    pub eta: Value,
}

#[derive(Debug, Deserialize)]
pub struct IngestResponse {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub history_entries: usize,
    pub rejected: Vec<Value>,
}

pub type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

fn search_body(property_id: i64, start: NaiveDate, end: NaiveDate) -> Value {
    json!({
        "property_id": property_id,
        "date_range": { "start": start, "end": end },
    })
}

async fn expect_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> TestResult<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Request failed with status {}: {}", status, error_text).into());
    }
    Ok(response.json::<T>().await?)
}

/// Create and start a search in one call, as an external worker does.
pub async fn launch_search(
    client: &reqwest::Client,
    base_url: &str,
    property_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> TestResult<SearchJobResponse> {
    let response = client
        .post(format!("{}/api/v1/searches/launch", base_url))
        .json(&search_body(property_id, start, end))
        .send()
        .await?;
    expect_json(response).await
}

/// Queue a search for the built-in worker.
pub async fn queue_search(
    client: &reqwest::Client,
    base_url: &str,
    property_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> TestResult<QueuedSearchResponse> {
    let response = client
        .post(format!("{}/api/v1/searches", base_url))
        .json(&search_body(property_id, start, end))
        .send()
        .await?;
    expect_json(response).await
}

pub async fn post_prices(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    rows: Vec<Value>,
) -> TestResult<IngestResponse> {
    let response = client
        .post(format!("{}/api/v1/searches/{}/prices", base_url, job_id))
        .json(&json!({ "rows": rows }))
        .send()
        .await?;
    expect_json(response).await
}

pub async fn advance(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    processed: i32,
    prices: i32,
) -> TestResult<SearchJobResponse> {
    let response = client
        .post(format!("{}/api/v1/searches/{}/advance", base_url, job_id))
        .json(&json!({
            "processed_dates_delta": processed,
            "prices_found_delta": prices,
        }))
        .send()
        .await?;
    expect_json(response).await
}

/// POST a body-less lifecycle signal (`start`, `complete`, `cancel`).
pub async fn signal(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    action: &str,
) -> TestResult<reqwest::Response> {
    Ok(client
        .post(format!("{}/api/v1/searches/{}/{}", base_url, job_id, action))
        .send()
        .await?)
}

pub async fn get_progress(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
) -> TestResult<ProgressResponse> {
    let response = client
        .get(format!("{}/api/v1/searches/{}/progress", base_url, job_id))
        .send()
        .await?;
    expect_json(response).await
}

pub async fn get_detail(client: &reqwest::Client, base_url: &str, job_id: Uuid) -> TestResult<Value> {
    let response = client
        .get(format!("{}/api/v1/searches/{}", base_url, job_id))
        .send()
        .await?;
    expect_json(response).await
}

/// Poll search progress until it reaches a terminal state (with timeout)
pub async fn wait_for_terminal(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> TestResult<ProgressResponse> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let progress = get_progress(client, base_url, job_id).await?;

        match progress.status.as_str() {
            "COMPLETED" | "FAILED" | "CANCELLED" => return Ok(progress),
            "PENDING" | "RUNNING" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!(
                        "  ... {}% ({}/{} dates, attempt {}/{})",
                        progress.progress_percent,
                        progress.processed_dates,
                        progress.total_dates,
                        attempt,
                        max_attempts
                    );
                }
                sleep(Duration::from_millis(500)).await;
            }
            _ => {
                return Err(format!("Unknown search status: {}", progress.status).into());
            }
        }
    }

    Err(format!("Search did not finish within {} seconds", timeout_secs).into())
}
