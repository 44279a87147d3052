use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tracing::error;

use crate::db::price_queries;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// Health check: database round-trip plus how many price rows arrived in the
/// last hour, so a stalled ingestion pipeline is visible here too.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let now = Utc::now();

    match price_queries::count_since(&state.pool, now - Duration::hours(1)).await {
        Ok(recent_prices) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": now.to_rfc3339(),
                "database": "connected",
                "recent_prices": recent_prices,
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": now.to_rfc3339(),
                    "error": e.to_string(),
                })),
            )
        }
    }
}
