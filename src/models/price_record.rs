use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// One hour's spot price for one bidding area. Uniqueness on
// (timestamp, price_area) is enforced by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceRecord {
    #[sqlx(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub price_cents_kwh: f64,
    pub price_area: String,
    pub forecast: bool,
}

impl PriceRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        price_cents_kwh: f64,
        price_area: impl Into<String>,
        forecast: bool,
    ) -> Self {
        Self {
            timestamp,
            price_cents_kwh,
            price_area: price_area.into(),
            forecast,
        }
    }
}
