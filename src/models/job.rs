use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::EngineError;

/// Lifecycle state of a price search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SearchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SearchStatus::Completed | SearchStatus::Failed | SearchStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Terminal states have no outgoing edges. A pending search may be
    /// cancelled or failed before it ever runs, but cannot complete.
    pub fn can_transition_to(self, next: SearchStatus) -> bool {
        use SearchStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Pending, Cancelled) | (Pending, Failed) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            _ => false,
        }
    }
}

/// How the search asks for quotes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    /// One-night stays for every check-in date.
    #[default]
    Daily,
    /// Multi-night stays of `bundle_nights` starting on every check-in date.
    Bundle,
}

/// Inclusive range of check-in dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::Validation(format!(
                "date range end {} is before start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of check-in dates covered, both ends included.
    pub fn total_dates(&self) -> i32 {
        ((self.end - self.start).num_days() + 1).max(0) as i32
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.total_dates() as i64).map(move |offset| start + Duration::days(offset))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// A price extraction search against one competitor property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchJob {
    pub id: Uuid,
    pub property_id: i64,
    pub hotel_id: i64,
    pub date_range: DateRange,
    pub status: SearchStatus,
    pub search_type: SearchType,
    pub bundle_nights: i32,
    pub total_dates: i32,
    pub processed_dates: i32,
    pub total_prices_found: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_progress_at: Option<DateTime<Utc>>,
    pub error_log: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for a new search.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSearch {
    pub property_id: i64,
    pub date_range: DateRange,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub bundle_nights: Option<i32>,
}

impl NewSearch {
    /// Stay length requested per check-in date.
    pub fn nights(&self) -> Result<i32, EngineError> {
        match (self.search_type, self.bundle_nights) {
            (SearchType::Daily, None | Some(1)) => Ok(1),
            (SearchType::Daily, Some(n)) => Err(EngineError::Validation(format!(
                "daily searches quote one night, got bundle_nights={}",
                n
            ))),
            (SearchType::Bundle, Some(n)) if (2..=30).contains(&n) => Ok(n),
            (SearchType::Bundle, Some(n)) => Err(EngineError::Validation(format!(
                "bundle_nights must be between 2 and 30, got {}",
                n
            ))),
            (SearchType::Bundle, None) => Err(EngineError::Validation(
                "bundle searches require bundle_nights".to_string(),
            )),
        }
    }
}
