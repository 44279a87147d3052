use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;

use crate::db::{price_queries, stats_queries};
use crate::errors::AppError;
use crate::models::{DailyStats, PriceRecord};

/// Daily stats for one date, served from the cache when present, otherwise
/// computed from that day's non-forecast prices and cached by upsert.
pub async fn get_or_compute(pool: &PgPool, date: NaiveDate) -> Result<DailyStats, AppError> {
    if let Some(cached) = stats_queries::fetch_by_date(pool, date).await? {
        return Ok(cached);
    }

    recompute_for(pool, date).await
}

/// Recompute and cache stats for one date, overwriting any cached row. Used
/// by the nightly job once a day's prices are all confirmed.
pub async fn recompute_for(pool: &PgPool, date: NaiveDate) -> Result<DailyStats, AppError> {
    let prices = price_queries::fetch_actual_for_date(pool, date).await?;

    if prices.is_empty() {
        return Err(AppError::NotFound(format!(
            "No price data available for {}",
            date
        )));
    }

    let stats = compute_stats(date, &prices);
    stats_queries::upsert(pool, &stats).await?;

    info!(
        "Computed daily stats for {}: avg {} c/kWh over {} hours",
        date, stats.avg_price, stats.price_count
    );

    Ok(stats)
}

fn compute_stats(date: NaiveDate, prices: &[PriceRecord]) -> DailyStats {
    let values: Vec<f64> = prices.iter().map(|p| p.price_cents_kwh).collect();

    let sum: f64 = values.iter().sum();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    DailyStats {
        date,
        avg_price: round2(sum / values.len() as f64),
        min_price: round2(min),
        max_price: round2(max),
        median_price: round2(median(&values)),
        price_count: values.len() as i32,
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(hour: u32, price: f64) -> PriceRecord {
        PriceRecord::new(
            Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap(),
            price,
            "FI",
            false,
        )
    }

    #[test]
    fn computes_aggregates_for_a_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let prices = vec![record(0, 2.0), record(1, 4.0), record(2, 9.0)];

        let stats = compute_stats(date, &prices);

        assert_eq!(stats.date, date);
        assert_eq!(stats.avg_price, 5.0);
        assert_eq!(stats.min_price, 2.0);
        assert_eq!(stats.max_price, 9.0);
        assert_eq!(stats.median_price, 4.0);
        assert_eq!(stats.price_count, 3);
    }

    #[test]
    fn average_is_rounded_to_cents() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let prices = vec![record(0, 1.0), record(1, 1.0), record(2, 2.0)];

        let stats = compute_stats(date, &prices);
        // 4/3 = 1.333... -> 1.33
        assert_eq!(stats.avg_price, 1.33);
    }

    #[test]
    fn median_of_even_count_is_mean_of_middle_pair() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 10.0]), 2.5);
    }

    #[test]
    fn median_of_odd_count_is_middle_value() {
        assert_eq!(median(&[10.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn median_of_single_value() {
        assert_eq!(median(&[7.55]), 7.55);
    }
}
