use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::db::history_queries;
use crate::error::EngineError;
use crate::models::history::{NewHistoryEntry, PriceHistoryEntry};
use crate::models::observation::PriceObservation;

/// `(new - old) / old * 100`, two decimals. `None` when there is no usable
/// previous price.
pub fn change_percentage(previous: Option<Decimal>, current: Decimal) -> Option<Decimal> {
    let old = previous?;
    if old.is_zero() {
        return None;
    }
    Some(((current - old) / old * Decimal::ONE_HUNDRED).round_dp(2))
}

/// Decide whether `observation` warrants a new history entry given the latest
/// known entry for its (property, date).
pub fn next_entry(latest: Option<&PriceHistoryEntry>, observation: &PriceObservation) -> Option<NewHistoryEntry> {
    let price = observation.nightly_price();
    let previous_price = latest.map(|e| e.price);
    if previous_price == Some(price) {
        return None;
    }

    Some(NewHistoryEntry {
        property_id: observation.property_id,
        check_in_date: observation.check_in_date,
        price,
        previous_price,
        change_percentage: change_percentage(previous_price, price),
        captured_at: observation.scraped_at,
    })
}

/// Appends nightly price changes per (property, check-in date).
#[derive(Clone)]
pub struct PriceHistoryRecorder {
    db: PgPool,
}

impl PriceHistoryRecorder {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record `observation` if its nightly rate differs from the latest entry.
    /// Returns the appended entry, if any. Runs on the caller's connection so
    /// the entry commits together with the observation.
    pub async fn record(
        &self,
        conn: &mut PgConnection,
        observation: &PriceObservation,
    ) -> Result<Option<PriceHistoryEntry>, EngineError> {
        let latest = history_queries::latest_entry(&mut *conn, observation.property_id, observation.check_in_date).await?;

        let Some(entry) = next_entry(latest.as_ref(), observation) else {
            return Ok(None);
        };

        let stored = history_queries::append_entry(conn, &entry).await?;
        debug!(
            property_id = stored.property_id,
            check_in = %stored.check_in_date,
            price = %stored.price,
            change = ?stored.change_percentage,
            "Price change recorded"
        );
        Ok(Some(stored))
    }

    pub async fn list(
        &self,
        property_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceHistoryEntry>, EngineError> {
        if to < from {
            return Err(EngineError::Validation(format!("history window {}..{} is reversed", from, to)));
        }
        Ok(history_queries::list_for_property(&self.db, property_id, from, to).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::observation::max_price;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn observation(price: Decimal, bundle_size: i32) -> PriceObservation {
        let check_in = NaiveDate::from_ymd_opt(2026, 7, 10).unwrap();
        PriceObservation {
            id: 1,
            search_id: Uuid::nil(),
            property_id: 9,
            check_in_date: check_in,
            check_out_date: check_in + Duration::days(bundle_size as i64),
            room_type: "Standard".to_string(),
            price,
            currency: "BRL".to_string(),
            availability_status: "AVAILABLE".to_string(),
            is_bundle: bundle_size > 1,
            bundle_size,
            scraped_at: Utc::now(),
        }
    }

    fn entry_from(new: NewHistoryEntry) -> PriceHistoryEntry {
        PriceHistoryEntry {
            id: 1,
            property_id: new.property_id,
            check_in_date: new.check_in_date,
            price: new.price,
            previous_price: new.previous_price,
            change_percentage: new.change_percentage,
            captured_at: new.captured_at,
        }
    }

    #[test]
    fn test_350_to_380_is_plus_8_57() {
        let pct = change_percentage(Some(Decimal::new(350, 0)), Decimal::new(380, 0)).unwrap();
        assert_eq!(pct, Decimal::new(857, 2));
    }

    #[test]
    fn test_first_observation_has_no_change() {
        let first = next_entry(None, &observation(Decimal::new(350, 0), 1)).unwrap();
        assert_eq!(first.previous_price, None);
        assert_eq!(first.change_percentage, None);
    }

    #[test]
    fn test_appends_only_on_change() {
        let first = entry_from(next_entry(None, &observation(Decimal::new(350, 0), 1)).unwrap());

        assert!(next_entry(Some(&first), &observation(Decimal::new(35000, 2), 1)).is_none());

        let second = next_entry(Some(&first), &observation(Decimal::new(380, 0), 1)).unwrap();
        assert_eq!(second.previous_price, Some(Decimal::new(350, 0)));
        assert_eq!(second.change_percentage, Some(Decimal::new(857, 2)));
    }

    #[test]
    fn test_bundle_compared_per_night() {
        let first = entry_from(next_entry(None, &observation(Decimal::new(350, 0), 1)).unwrap());
        // three nights at 350 each is no change
        assert!(next_entry(Some(&first), &observation(Decimal::new(1050, 0), 3)).is_none());
    }

    #[test]
    fn test_price_drop_is_negative() {
        let pct = change_percentage(Some(Decimal::new(400, 0)), Decimal::new(300, 0)).unwrap();
        assert_eq!(pct, Decimal::new(-25, 0));
        assert_eq!(change_percentage(Some(Decimal::ZERO), Decimal::new(300, 0)), None);
    }

    #[test]
    fn test_extreme_rise_fits_change_column() {
        // NUMERIC(18, 2) leaves 16 integer digits
        let limit = Decimal::new(10_i64.pow(16), 0);
        let pct = change_percentage(Some(Decimal::new(1, 2)), max_price()).unwrap();
        assert!(pct < limit);
        assert!(pct > Decimal::new(10_i64.pow(13), 0));
    }
}
