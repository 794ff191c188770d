use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::observation::PriceStats;

/// Per property, per check-in date aggregate of nightly rates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyAggregate {
    pub property_id: i64,
    pub check_in_date: NaiveDate,
    pub count: i64,
    pub avg: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

/// Query parameters for a trend request.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub future_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendProperty {
    pub id: i64,
    pub name: String,
    pub is_main_property: bool,
}

/// Stats for every property on one date. `None` marks a date with no quotes.
#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub is_future: bool,
    pub is_today: bool,
    pub values: Vec<Option<PriceStats>>,
}

/// One contiguous run of dates, indexed like `TrendSeries::properties`.
#[derive(Debug, Clone, Serialize)]
pub struct TrendSeries {
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChartDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Historical and projected series sharing one property index.
#[derive(Debug, Clone, Serialize)]
pub struct PriceTrend {
    pub today: NaiveDate,
    pub properties: Vec<TrendProperty>,
    pub historical: TrendSeries,
    pub future: TrendSeries,
}

/// A property as it appears in chart rows. `key` is the row field holding
/// its price; it is the property name unless that name is already taken.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartProperty {
    #[serde(flatten)]
    pub property: TrendProperty,
    pub key: String,
}

/// Flattened shape consumed by the charting front end.
#[derive(Debug, Clone, Serialize)]
pub struct ChartResponse {
    pub chart_data: Vec<Map<String, Value>>,
    pub properties: Vec<ChartProperty>,
    pub date_range: ChartDateRange,
    pub today: NaiveDate,
}
