use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A listing tracked for a client hotel, either the hotel itself or a competitor.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: i64,
    pub uuid: Uuid,
    pub hotel_id: i64,
    pub name: String,
    pub external_url: String,
    /// Listing platform slug, e.g. "booking" or "airbnb".
    pub platform: String,
    pub is_main_property: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
