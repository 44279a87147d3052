use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Derived aggregate for one UTC calendar day, computed from non-forecast
/// price records and cached in the `daily_stats` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub median_price: f64,
    pub price_count: i32,
}
