use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::observation::RawPriceRow;
use crate::models::property::Property;

/// Client for the external browser-automation service that scrapes listings.
pub struct ExtractorClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Serialize)]
struct QuoteRequest<'a> {
    property_url: &'a str,
    platform: &'a str,
    check_in_date: NaiveDate,
    nights: i32,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    rows: Vec<RawPriceRow>,
}

impl ExtractorClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, ExtractorError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("rate-scout/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Ask the extraction service for every quote of one check-in date.
    pub async fn fetch_quotes(
        &self,
        property: &Property,
        check_in_date: NaiveDate,
        nights: i32,
    ) -> Result<Vec<RawPriceRow>, ExtractorError> {
        let url = format!("{}/v1/quotes", self.base_url);
        let body = QuoteRequest {
            property_url: &property.external_url,
            platform: &property.platform,
            check_in_date,
            nights,
        };

        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExtractorError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let quotes: QuoteResponse = response.json().await?;
        Ok(quotes.rows)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction service returned {status}: {body}")]
    Status { status: u16, body: String },
}
