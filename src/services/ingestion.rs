use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use garde::Validate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::observation_queries;
use crate::error::EngineError;
use crate::models::job::SearchJob;
use crate::models::observation::{
    AvailabilityStatus, IngestReport, NewObservation, RawPriceRow, RowRejection, DEFAULT_CURRENCY,
    DEFAULT_ROOM_TYPE, MAX_BUNDLE_NIGHTS,
};
use crate::services::history::PriceHistoryRecorder;
use crate::services::jobs::JobStateMachine;

/// A batch of raw rows posted for one search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestBatch {
    pub rows: Vec<RawPriceRow>,
    /// Applied to rows that carry no `scraped_at` of their own.
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Values used for fields a row leaves out.
#[derive(Debug, Clone, Copy)]
pub struct RowDefaults {
    pub scraped_at: DateTime<Utc>,
    pub nights: i32,
}

/// Parse a check-in/check-out date in ISO (`2026-03-14`) or day-first
/// (`14/03/2026`) form.
pub fn parse_date(input: &str) -> Result<NaiveDate, EngineError> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%d/%m/%Y"))
        .map_err(|_| EngineError::Validation(format!("unrecognized date {:?}", input)))
}

/// Parse a price given as a JSON number or a display string such as
/// `"R$ 1.234,56"` or `"$1,234.56"`. Rounded to cents.
pub fn parse_price(value: &Value) -> Result<Decimal, EngineError> {
    let parsed = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_price_text(s),
        _ => None,
    };
    parsed
        .map(|d| d.round_dp(2))
        .ok_or_else(|| EngineError::Validation(format!("unparseable price {}", value)))
}

fn parse_price_text(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        // Whichever separator comes last is the decimal mark.
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let decimals = cleaned.len() - c - 1;
            if cleaned.matches(',').count() == 1 && decimals <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(d)) => {
            let decimals = cleaned.len() - d - 1;
            if cleaned.matches('.').count() > 1 || decimals == 3 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

fn currency_from_symbol(value: &Value) -> Option<&'static str> {
    let text = value.as_str()?;
    if text.contains("R$") {
        Some("BRL")
    } else if text.contains('€') {
        Some("EUR")
    } else if text.contains('$') {
        Some("USD")
    } else {
        None
    }
}

/// Turn a loosely typed row into a validated observation, filling defaults.
pub fn normalize_row(raw: &RawPriceRow, defaults: RowDefaults) -> Result<NewObservation, EngineError> {
    let check_in_date = raw
        .check_in_date
        .as_deref()
        .ok_or_else(|| EngineError::Validation("missing check_in_date".to_string()))
        .and_then(parse_date)?;

    let check_out = raw.check_out_date.as_deref().map(parse_date).transpose()?;
    let bundle_size = match (check_out, raw.nights) {
        (Some(out), nights) => {
            let span = (out - check_in_date).num_days();
            if span < 1 {
                return Err(EngineError::Validation(format!(
                    "check_out_date {} is not after check_in_date {}",
                    out, check_in_date
                )));
            }
            if let Some(n) = nights {
                if n as i64 != span {
                    return Err(EngineError::Validation(format!(
                        "nights={} disagrees with a {}-night stay",
                        n, span
                    )));
                }
            }
            span.min(i32::MAX as i64) as i32
        }
        (None, Some(n)) => n,
        (None, None) => defaults.nights,
    };
    if !(1..=MAX_BUNDLE_NIGHTS).contains(&bundle_size) {
        return Err(EngineError::Validation(format!(
            "stay of {} nights is outside 1..={}",
            bundle_size, MAX_BUNDLE_NIGHTS
        )));
    }
    let check_out_date = check_out.unwrap_or(check_in_date + Duration::days(bundle_size as i64));

    let price_value = raw
        .price
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or_else(|| EngineError::Validation("missing price".to_string()))?;
    let price = parse_price(price_value)?;

    let currency = raw
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .or_else(|| currency_from_symbol(price_value).map(str::to_string))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let room_type = raw
        .room_type
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_ROOM_TYPE)
        .to_string();

    let availability_status = match raw.availability_status.as_deref().map(str::trim) {
        None | Some("") => AvailabilityStatus::default(),
        Some(s) => s.parse::<AvailabilityStatus>().map_err(|_| {
            EngineError::Validation(format!("unknown availability_status {:?}", s))
        })?,
    };

    let observation = NewObservation {
        check_in_date,
        check_out_date,
        room_type,
        price,
        currency,
        availability_status,
        bundle_size,
        scraped_at: raw.scraped_at.unwrap_or(defaults.scraped_at),
    };
    observation
        .validate()
        .map_err(|report| EngineError::Validation(report.to_string()))?;

    Ok(observation)
}

/// Validates and stores scraped quotes for running searches.
#[derive(Clone)]
pub struct PriceIngestor {
    db: PgPool,
    jobs: JobStateMachine,
    history: PriceHistoryRecorder,
}

impl PriceIngestor {
    pub fn new(db: PgPool, jobs: JobStateMachine, history: PriceHistoryRecorder) -> Self {
        Self { db, jobs, history }
    }

    /// Store a batch of rows for a running search.
    ///
    /// Bad rows are reported and skipped, duplicates are counted and skipped.
    /// Each row and its history entry commit together. A storage failure
    /// aborts the rest of the batch; rows already stored stay.
    pub async fn ingest_batch(&self, job_id: Uuid, batch: &IngestBatch) -> Result<IngestReport, EngineError> {
        let job = self.jobs.require_running(job_id, "ingest prices").await?;
        let defaults = RowDefaults {
            scraped_at: batch.scraped_at.unwrap_or_else(Utc::now),
            nights: job.bundle_nights,
        };

        let mut report = IngestReport {
            received: batch.rows.len(),
            ..Default::default()
        };

        for (index, raw) in batch.rows.iter().enumerate() {
            let observation = match normalize_for_job(&job, raw, defaults) {
                Ok(obs) => obs,
                Err(e) => {
                    warn!(job_id = %job_id, row = index, error = %e, "Skipping malformed price row");
                    metrics::counter!("price_observations_rejected_total").increment(1);
                    report.rejected.push(RowRejection {
                        index,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let mut tx = self.db.begin().await?;
            let stored = observation_queries::insert_observation(&mut tx, job_id, job.property_id, &observation).await?;
            let history_entry = match &stored {
                Some(stored) => self.history.record(&mut tx, stored).await?,
                None => None,
            };
            tx.commit().await?;

            match stored {
                Some(_) => {
                    report.inserted += 1;
                    if history_entry.is_some() {
                        report.history_entries += 1;
                    }
                }
                None => {
                    debug!(
                        job_id = %job_id,
                        check_in = %observation.check_in_date,
                        scraped_at = %observation.scraped_at,
                        "Duplicate price row ignored"
                    );
                    report.duplicates += 1;
                }
            }
        }

        metrics::counter!("price_observations_ingested_total").increment(report.inserted as u64);
        info!(
            job_id = %job_id,
            received = report.received,
            inserted = report.inserted,
            duplicates = report.duplicates,
            rejected = report.rejected.len(),
            history_entries = report.history_entries,
            "Price batch ingested"
        );

        Ok(report)
    }
}

fn normalize_for_job(job: &SearchJob, raw: &RawPriceRow, defaults: RowDefaults) -> Result<NewObservation, EngineError> {
    let observation = normalize_row(raw, defaults)?;
    if !job.date_range.contains(observation.check_in_date) {
        return Err(EngineError::Validation(format!(
            "check_in_date {} is outside the search range {}..={}",
            observation.check_in_date, job.date_range.start, job.date_range.end
        )));
    }
    Ok(observation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> RowDefaults {
        RowDefaults {
            scraped_at: DateTime::parse_from_rfc3339("2026-02-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            nights: 1,
        }
    }

    fn row(check_in: &str, price: Value) -> RawPriceRow {
        RawPriceRow {
            check_in_date: Some(check_in.to_string()),
            price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let obs = normalize_row(&row("2026-03-14", json!(350)), defaults()).unwrap();
        assert_eq!(obs.room_type, "Standard");
        assert_eq!(obs.currency, "BRL");
        assert_eq!(obs.availability_status, AvailabilityStatus::Available);
        assert_eq!(obs.bundle_size, 1);
        assert!(!obs.is_bundle());
        assert_eq!(obs.check_out_date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(obs.scraped_at, defaults().scraped_at);
        assert_eq!(obs.price, Decimal::new(350, 0));
    }

    #[test]
    fn test_bundle_from_check_out_date() {
        let mut raw = row("2026-03-14", json!("R$ 1.050,00"));
        raw.check_out_date = Some("17/03/2026".to_string());
        let obs = normalize_row(&raw, defaults()).unwrap();
        assert_eq!(obs.bundle_size, 3);
        assert!(obs.is_bundle());
        // stored as the stay total
        assert_eq!(obs.price, Decimal::new(105000, 2));
    }

    #[test]
    fn test_bundle_from_search_default_nights() {
        let mut d = defaults();
        d.nights = 2;
        let obs = normalize_row(&row("2026-03-14", json!(700)), d).unwrap();
        assert_eq!(obs.bundle_size, 2);
        assert_eq!(obs.check_out_date, NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
    }

    #[test]
    fn test_conflicting_nights_rejected() {
        let mut raw = row("2026-03-14", json!(700));
        raw.check_out_date = Some("2026-03-16".to_string());
        raw.nights = Some(3);
        assert!(matches!(
            normalize_row(&raw, defaults()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let d = defaults();
        assert!(normalize_row(&RawPriceRow::default(), d).is_err());
        assert!(normalize_row(&row("14 March", json!(300)), d).is_err());
        assert!(normalize_row(&row("2026-03-14", json!("sold out")), d).is_err());
        assert!(normalize_row(&row("2026-03-14", json!(0)), d).is_err());
        assert!(normalize_row(&row("2026-03-14", json!(-20)), d).is_err());
        assert!(normalize_row(&row("2026-03-14", json!("R$ 99.999.999.999,00")), d).is_err());
        assert!(normalize_row(&row("2026-03-14", Value::Null), d).is_err());

        let mut raw = row("2026-03-14", json!(300));
        raw.availability_status = Some("maybe".to_string());
        assert!(normalize_row(&raw, d).is_err());

        let mut raw = row("2026-03-14", json!(300));
        raw.currency = Some("REAL".to_string());
        assert!(normalize_row(&raw, d).is_err());
    }

    #[test]
    fn test_price_formats() {
        assert_eq!(parse_price(&json!("R$ 1.234,56")).unwrap(), Decimal::new(123456, 2));
        assert_eq!(parse_price(&json!("$1,234.56")).unwrap(), Decimal::new(123456, 2));
        assert_eq!(parse_price(&json!("380,5")).unwrap(), Decimal::new(3805, 1));
        assert_eq!(parse_price(&json!("1.234")).unwrap(), Decimal::new(1234, 0));
        assert_eq!(parse_price(&json!("99.90")).unwrap(), Decimal::new(9990, 2));
        assert_eq!(parse_price(&json!(412.499)).unwrap(), Decimal::new(41250, 2));
        assert!(parse_price(&json!(true)).is_err());
    }

    #[test]
    fn test_currency_inferred_from_symbol() {
        let obs = normalize_row(&row("2026-03-14", json!("US$ 120.00")), defaults()).unwrap();
        assert_eq!(obs.currency, "USD");
        let mut raw = row("2026-03-14", json!(120));
        raw.currency = Some(" eur ".to_string());
        assert_eq!(normalize_row(&raw, defaults()).unwrap().currency, "EUR");
    }

    #[test]
    fn test_row_scraped_at_wins_over_batch_default() {
        let mut raw = row("2026-03-14", json!(300));
        let own = Utc::now();
        raw.scraped_at = Some(own);
        assert_eq!(normalize_row(&raw, defaults()).unwrap().scraped_at, own);
    }
}
