use chrono::{DateTime, NaiveDate, Utc};
use garde::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

pub const DEFAULT_ROOM_TYPE: &str = "Standard";
pub const DEFAULT_CURRENCY: &str = "BRL";
pub const MAX_BUNDLE_NIGHTS: i32 = 30;

/// Largest stay total the `price NUMERIC(12, 2)` column holds.
pub fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AvailabilityStatus {
    #[default]
    Available,
    SoldOut,
    Unknown,
}

/// A row as delivered by the extraction service. Every field is optional and
/// prices may be numbers or formatted strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPriceRow {
    pub check_in_date: Option<String>,
    pub check_out_date: Option<String>,
    pub nights: Option<i32>,
    pub room_type: Option<String>,
    pub price: Option<serde_json::Value>,
    pub currency: Option<String>,
    pub availability_status: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

/// A normalized quote ready to be stored.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewObservation {
    #[garde(skip)]
    pub check_in_date: NaiveDate,

    #[garde(skip)]
    pub check_out_date: NaiveDate,

    #[garde(length(min = 1, max = 120))]
    pub room_type: String,

    #[garde(custom(positive_amount))]
    pub price: Decimal,

    #[garde(ascii, length(min = 3, max = 3))]
    pub currency: String,

    #[garde(skip)]
    pub availability_status: AvailabilityStatus,

    #[garde(range(min = 1, max = 30))]
    pub bundle_size: i32,

    #[garde(skip)]
    pub scraped_at: DateTime<Utc>,
}

impl NewObservation {
    pub fn is_bundle(&self) -> bool {
        self.bundle_size > 1
    }
}

fn positive_amount(value: &Decimal, _ctx: &()) -> garde::Result {
    if !value.is_sign_positive() || value.is_zero() {
        return Err(garde::Error::new("price must be greater than zero"));
    }
    if *value > max_price() {
        return Err(garde::Error::new(format!("price may not exceed {}", max_price())));
    }
    Ok(())
}

/// A stored quote. `price` is the total for the whole stay.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceObservation {
    pub id: i64,
    pub search_id: Uuid,
    pub property_id: i64,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub room_type: String,
    pub price: Decimal,
    pub currency: String,
    pub availability_status: String,
    pub is_bundle: bool,
    pub bundle_size: i32,
    pub scraped_at: DateTime<Utc>,
}

impl PriceObservation {
    /// Per-night rate, rounded to cents.
    pub fn nightly_price(&self) -> Decimal {
        nightly_rate(self.price, self.bundle_size)
    }
}

pub fn nightly_rate(total: Decimal, bundle_size: i32) -> Decimal {
    (total / Decimal::from(bundle_size.max(1))).round_dp(2)
}

/// Count/avg/min/max of nightly rates over a set of observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PriceStats {
    pub count: i64,
    pub avg: Option<Decimal>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl PriceStats {
    pub fn from_observations(observations: &[PriceObservation]) -> Self {
        let rates: Vec<Decimal> = observations.iter().map(|o| o.nightly_price()).collect();
        if rates.is_empty() {
            return Self::default();
        }
        let sum: Decimal = rates.iter().copied().sum();
        Self {
            count: rates.len() as i64,
            avg: Some((sum / Decimal::from(rates.len() as i64)).round_dp(2)),
            min: rates.iter().copied().min(),
            max: rates.iter().copied().max(),
        }
    }
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub history_entries: usize,
    pub rejected: Vec<RowRejection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowRejection {
    pub index: usize,
    pub reason: String,
}
