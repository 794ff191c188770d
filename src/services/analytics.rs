use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::PgPool;
use tracing::debug;

use crate::db::{analytics_queries, property_queries};
use crate::error::EngineError;
use crate::models::analytics::{
    ChartDateRange, ChartProperty, ChartResponse, DailyAggregate, PriceTrend, TrendPoint, TrendProperty, TrendQuery,
    TrendSeries,
};
use crate::models::observation::PriceStats;
use crate::models::property::Property;

/// Longest requested window, and longest projection, a trend may cover.
const MAX_WINDOW_DAYS: i64 = 400;

/// Row fields every chart row carries besides the per-property prices.
const RESERVED_CHART_KEYS: [&str; 3] = ["date", "isFuture", "isToday"];

fn series(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    properties: &[TrendProperty],
    lookup: &HashMap<(i64, NaiveDate), PriceStats>,
) -> TrendSeries {
    let mut points = Vec::new();
    let mut date = from;
    while date <= to {
        points.push(TrendPoint {
            date,
            is_future: date > today,
            is_today: date == today,
            values: properties
                .iter()
                .map(|p| lookup.get(&(p.id, date)).cloned())
                .collect(),
        });
        date += Duration::days(1);
    }
    TrendSeries { points }
}

/// Shape aggregates into a historical series `[start, min(end, today)]` and a
/// future series `(today, today + future_days]`. Every date appears in its
/// series; a property with no quotes on a date gets `None`.
pub fn build_trend(
    properties: &[Property],
    aggregates: &[DailyAggregate],
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    future_days: u32,
) -> PriceTrend {
    let mut ordered: Vec<&Property> = properties.iter().collect();
    ordered.sort_by(|a, b| {
        b.is_main_property
            .cmp(&a.is_main_property)
            .then_with(|| a.name.cmp(&b.name))
    });
    let properties: Vec<TrendProperty> = ordered
        .into_iter()
        .map(|p| TrendProperty {
            id: p.id,
            name: p.name.clone(),
            is_main_property: p.is_main_property,
        })
        .collect();

    let lookup: HashMap<(i64, NaiveDate), PriceStats> = aggregates
        .iter()
        .map(|a| {
            (
                (a.property_id, a.check_in_date),
                PriceStats {
                    count: a.count,
                    avg: Some(a.avg),
                    min: Some(a.min),
                    max: Some(a.max),
                },
            )
        })
        .collect();

    let historical = series(start, end.min(today), today, &properties, &lookup);
    let future = series(
        today + Duration::days(1),
        today + Duration::days(future_days as i64),
        today,
        &properties,
        &lookup,
    );

    PriceTrend {
        today,
        properties,
        historical,
        future,
    }
}

/// Row key for each property: its name, or `name (#id)` when the name is a
/// reserved field or repeats an earlier property's key.
pub fn chart_keys(properties: &[TrendProperty]) -> Vec<String> {
    let mut taken: HashSet<String> = RESERVED_CHART_KEYS.iter().map(|k| k.to_string()).collect();
    properties
        .iter()
        .map(|p| {
            let key = if taken.contains(&p.name) {
                format!("{} (#{})", p.name, p.id)
            } else {
                p.name.clone()
            };
            taken.insert(key.clone());
            key
        })
        .collect()
}

fn chart_number(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Flatten a trend into rows keyed by property for charting. Prices are JSON
/// numbers; dates without quotes are `null`.
pub fn to_chart(trend: &PriceTrend) -> ChartResponse {
    let keys = chart_keys(&trend.properties);
    let points = trend.historical.points.iter().chain(trend.future.points.iter());
    let chart_data: Vec<Map<String, Value>> = points
        .map(|point| {
            let mut row = Map::new();
            row.insert("date".to_string(), Value::String(point.date.to_string()));
            for (key, stats) in keys.iter().zip(point.values.iter()) {
                let value = stats
                    .as_ref()
                    .and_then(|s| s.avg)
                    .map(chart_number)
                    .unwrap_or(Value::Null);
                row.insert(key.clone(), value);
            }
            row.insert("isFuture".to_string(), Value::Bool(point.is_future));
            row.insert("isToday".to_string(), Value::Bool(point.is_today));
            row
        })
        .collect();

    let first = trend
        .historical
        .points
        .first()
        .or(trend.future.points.first())
        .map(|p| p.date)
        .unwrap_or(trend.today);
    let last = trend
        .future
        .points
        .last()
        .or(trend.historical.points.last())
        .map(|p| p.date)
        .unwrap_or(trend.today);

    ChartResponse {
        chart_data,
        properties: trend
            .properties
            .iter()
            .cloned()
            .zip(keys)
            .map(|(property, key)| ChartProperty { property, key })
            .collect(),
        date_range: ChartDateRange { start: first, end: last },
        today: trend.today,
    }
}

/// Historical and projected price trends per hotel.
#[derive(Clone)]
pub struct AnalyticsAggregator {
    db: PgPool,
    default_future_days: u32,
}

impl AnalyticsAggregator {
    pub fn new(db: PgPool, default_future_days: u32) -> Self {
        Self {
            db,
            default_future_days,
        }
    }

    pub async fn price_trend(&self, hotel_id: i64, query: &TrendQuery) -> Result<PriceTrend, EngineError> {
        if query.end < query.start {
            return Err(EngineError::Validation(format!(
                "trend window end {} is before start {}",
                query.end, query.start
            )));
        }
        if (query.end - query.start).num_days() > MAX_WINDOW_DAYS {
            return Err(EngineError::Validation(format!(
                "trend window may not exceed {} days",
                MAX_WINDOW_DAYS
            )));
        }
        let future_days = query.future_days.unwrap_or(self.default_future_days);
        if future_days as i64 > MAX_WINDOW_DAYS {
            return Err(EngineError::Validation(format!(
                "future_days may not exceed {}",
                MAX_WINDOW_DAYS
            )));
        }
        let today = Utc::now().date_naive();

        let properties = property_queries::list_hotel_properties(&self.db, hotel_id, true).await?;

        let mut aggregates = Vec::new();
        let historical_end = query.end.min(today);
        if query.start <= historical_end {
            aggregates.extend(
                analytics_queries::daily_aggregates(&self.db, hotel_id, query.start, historical_end).await?,
            );
        }
        if future_days > 0 {
            aggregates.extend(
                analytics_queries::daily_aggregates(
                    &self.db,
                    hotel_id,
                    today + Duration::days(1),
                    today + Duration::days(future_days as i64),
                )
                .await?,
            );
        }
        debug!(
            hotel_id,
            properties = properties.len(),
            aggregates = aggregates.len(),
            "Building price trend"
        );

        Ok(build_trend(&properties, &aggregates, query.start, query.end, today, future_days))
    }

    pub async fn chart(&self, hotel_id: i64, query: &TrendQuery) -> Result<ChartResponse, EngineError> {
        let trend = self.price_trend(hotel_id, query).await?;
        Ok(to_chart(&trend))
    }
}
