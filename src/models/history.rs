use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One nightly price change for a (property, check-in date) pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub property_id: i64,
    pub check_in_date: NaiveDate,
    pub price: Decimal,
    pub previous_price: Option<Decimal>,
    /// Null for the first entry of a pair.
    pub change_percentage: Option<Decimal>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub property_id: i64,
    pub check_in_date: NaiveDate,
    pub price: Decimal,
    pub previous_price: Option<Decimal>,
    pub change_percentage: Option<Decimal>,
    pub captured_at: DateTime<Utc>,
}
