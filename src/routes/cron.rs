use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::store::PgPriceStore;
use crate::errors::AppError;
use crate::services::price_service::{self, IngestSummary};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/fetch-prices", post(fetch_prices))
        .route("/backfill-prices", post(backfill_prices))
}

/// The scheduler trigger surface is authenticated with a shared secret:
/// `Authorization: Bearer <CRON_SECRET>`.
fn verify_cron_auth(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(secret) = state.cron_secret.as_deref() else {
        warn!("Cron endpoint called but CRON_SECRET is not configured");
        return Err(AppError::Unauthorized);
    };

    let provided = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());

    if provided != Some(format!("Bearer {}", secret).as_str()) {
        return Err(AppError::Unauthorized);
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    success: bool,
    message: String,
    updated_count: i32,
    error_count: i32,
    errors: Vec<String>,
}

impl IngestResponse {
    fn from_summary(message: String, summary: IngestSummary) -> Self {
        Self {
            success: true,
            message,
            updated_count: summary.updated_count,
            error_count: summary.error_count,
            errors: summary.errors,
        }
    }
}

/// POST /api/cron/fetch-prices - one ingestion pass over yesterday, today
/// and tomorrow. Invoked by an external scheduler on a fixed cadence;
/// re-invocation is safe because every write is an idempotent upsert.
async fn fetch_prices(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IngestResponse>, AppError> {
    verify_cron_auth(&state, &headers)?;

    info!("Starting price fetch cron job...");

    let store = PgPriceStore::new(state.pool.clone());
    let summary = price_service::ingest_window(&store, state.market_data.as_ref()).await;

    let message = if summary.updated_count == 0 && summary.error_count == 0 {
        "No new prices to update".to_string()
    } else {
        format!("Updated {} price records", summary.updated_count)
    };

    Ok(Json(IngestResponse::from_summary(message, summary)))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct BackfillRequest {
    start_year: Option<i32>,
    end_year: Option<i32>,
    batch_size: i64,
}

impl Default for BackfillRequest {
    fn default() -> Self {
        Self {
            start_year: None,
            end_year: None,
            batch_size: 7,
        }
    }
}

/// POST /api/cron/backfill-prices - historical ingestion for a year range
/// (defaults to the current year). Duplicates are skipped silently, so the
/// backfill can be re-run over already loaded years.
async fn backfill_prices(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<BackfillRequest>>,
) -> Result<Json<IngestResponse>, AppError> {
    verify_cron_auth(&state, &headers)?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let current_year = Utc::now().year();

    let start_year = request.start_year.unwrap_or(current_year);
    let end_year = request.end_year.unwrap_or(start_year);

    if start_year > end_year {
        return Err(AppError::Validation(format!(
            "start_year {} is after end_year {}",
            start_year, end_year
        )));
    }
    if !(1..=31).contains(&request.batch_size) {
        return Err(AppError::Validation(
            "batch_size must be between 1 and 31 days".to_string(),
        ));
    }

    info!("Starting historical price backfill for {}-{}...", start_year, end_year);

    let store = PgPriceStore::new(state.pool.clone());
    let summary = price_service::backfill_range(
        &store,
        state.market_data.as_ref(),
        start_year,
        end_year,
        request.batch_size,
    )
    .await?;

    Ok(Json(IngestResponse::from_summary(
        format!("Historical backfill completed for {}-{}", start_year, end_year),
        summary,
    )))
}
