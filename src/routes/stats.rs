use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::DailyStats;
use crate::services::stats_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_stats))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    data: DailyStats,
}

/// GET /api/stats?date=2024-01-15 - daily aggregates for one UTC calendar
/// day, defaulting to today. Computed on demand and cached.
async fn get_stats(
    Query(query): Query<StatsQuery>,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let date = match query.date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| AppError::Validation(format!("invalid date {:?}, expected YYYY-MM-DD", raw)))?,
        None => Utc::now().date_naive(),
    };

    info!("GET /api/stats - date {}", date);

    let stats = stats_service::get_or_compute(&state.pool, date)
        .await
        .map_err(|e| {
            if !matches!(e, AppError::NotFound(_)) {
                error!("Failed to compute stats for {}: {}", date, e);
            }
            e
        })?;

    Ok(Json(StatsResponse {
        success: true,
        data: stats,
    }))
}
