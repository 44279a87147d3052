use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{cron, health, jobs, prices, stats};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/prices", prices::router())
        .nest("/api/stats", stats::router())
        .nest("/api/cron", cron::router())
        .nest("/api/jobs", jobs::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
