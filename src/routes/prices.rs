use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db::{price_queries, stats_queries};
use crate::errors::AppError;
use crate::models::{DailyStats, PriceRecord};
use crate::state::AppState;

/// Finnish VAT on electricity, 25.5%.
const VAT_RATE: f64 = 1.255;

const MAX_HOURS: i64 = 168;
const MAX_DAYS: i64 = 1825;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_prices))
        .route("/current", get(get_current_price))
        .route("/daily", get(get_daily_prices))
}

#[derive(Debug, Deserialize)]
struct PricesQuery {
    hours: Option<i64>,
}

#[derive(Debug, Serialize)]
struct PricesResponse {
    success: bool,
    data: Vec<PriceRecord>,
    count: usize,
}

/// GET /api/prices?hours=24 - recent hourly prices, newest first.
async fn get_prices(
    Query(query): Query<PricesQuery>,
    State(state): State<AppState>,
) -> Result<Json<PricesResponse>, AppError> {
    let hours = query.hours.unwrap_or(24).clamp(1, MAX_HOURS);
    info!("GET /api/prices - last {} hours", hours);

    let prices = price_queries::fetch_recent(&state.pool, hours)
        .await
        .map_err(|e| {
            error!("Failed to fetch prices: {}", e);
            AppError::Db(e)
        })?;

    Ok(Json(PricesResponse {
        count: prices.len(),
        data: prices,
        success: true,
    }))
}

#[derive(Debug, Serialize)]
struct CurrentPrice {
    current: PriceRecord,
    previous: Option<PriceRecord>,
}

#[derive(Debug, Serialize)]
struct CurrentPriceResponse {
    success: bool,
    data: CurrentPrice,
}

/// GET /api/prices/current - the running hour's price and the one before it.
async fn get_current_price(
    State(state): State<AppState>,
) -> Result<Json<CurrentPriceResponse>, AppError> {
    info!("GET /api/prices/current");

    let now = Utc::now();
    let mut latest = price_queries::fetch_latest(&state.pool, now)
        .await
        .map_err(|e| {
            error!("Failed to fetch current price: {}", e);
            AppError::Db(e)
        })?;

    if latest.is_empty() {
        return Err(AppError::NotFound("No price data available".to_string()));
    }

    let current = normalize_forecast(latest.remove(0), now);
    let previous = latest.pop().map(|r| normalize_forecast(r, now));

    Ok(Json(CurrentPriceResponse {
        success: true,
        data: CurrentPrice { current, previous },
    }))
}

#[derive(Debug, Deserialize)]
struct DailyQuery {
    days: Option<i64>,
    vat: Option<bool>,
}

#[derive(Debug, Serialize)]
struct DailyPricesResponse {
    success: bool,
    data: Vec<DailyStats>,
    count: usize,
    vat_included: bool,
}

/// GET /api/prices/daily?days=365&vat=true - cached daily aggregates in
/// chronological order, optionally with VAT applied.
async fn get_daily_prices(
    Query(query): Query<DailyQuery>,
    State(state): State<AppState>,
) -> Result<Json<DailyPricesResponse>, AppError> {
    let days = query.days.unwrap_or(365).clamp(1, MAX_DAYS);
    let include_vat = query.vat.unwrap_or(false);
    info!("GET /api/prices/daily - last {} days (vat: {})", days, include_vat);

    let mut stats = stats_queries::fetch_recent(&state.pool, days)
        .await
        .map_err(|e| {
            error!("Failed to fetch daily stats: {}", e);
            AppError::Db(e)
        })?;

    // Query returns newest first; charts want chronological order.
    stats.reverse();

    if include_vat {
        stats = stats.into_iter().map(|s| apply_vat(s, VAT_RATE)).collect();
    }

    Ok(Json(DailyPricesResponse {
        count: stats.len(),
        data: stats,
        success: true,
        vat_included: include_vat,
    }))
}

/// The hourly sweep lags the hour boundary, so a row fetched between the two
/// can still carry `forecast: true` for an hour that has started. The served
/// flag derives from the clock, not from the not-yet-swept row.
fn normalize_forecast(mut record: PriceRecord, now: chrono::DateTime<Utc>) -> PriceRecord {
    record.forecast = record.timestamp > now;
    record
}

fn apply_vat(stats: DailyStats, rate: f64) -> DailyStats {
    DailyStats {
        avg_price: round2(stats.avg_price * rate),
        min_price: round2(stats.min_price * rate),
        max_price: round2(stats.max_price * rate),
        median_price: round2(stats.median_price * rate),
        ..stats
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn served_forecast_flag_follows_the_clock_not_the_row() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        let hour_start = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();

        // The running hour's row before the sweep has caught up.
        let unswept = PriceRecord::new(hour_start, 7.55, "FI", true);
        assert!(!normalize_forecast(unswept, now).forecast);

        let upcoming = PriceRecord::new(hour_start + chrono::Duration::hours(1), 8.0, "FI", true);
        assert!(normalize_forecast(upcoming, now).forecast);
    }

    #[test]
    fn vat_is_applied_to_every_aggregate() {
        let stats = DailyStats {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            avg_price: 10.0,
            min_price: 4.0,
            max_price: 20.0,
            median_price: 8.0,
            price_count: 24,
        };

        let with_vat = apply_vat(stats, VAT_RATE);
        assert_eq!(with_vat.avg_price, 12.55);
        assert_eq!(with_vat.min_price, 5.02);
        assert_eq!(with_vat.max_price, 25.1);
        assert_eq!(with_vat.median_price, 10.04);
        assert_eq!(with_vat.price_count, 24);
    }
}
