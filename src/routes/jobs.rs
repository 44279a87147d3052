use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::db::job_queries::{self, JobRun};
use crate::errors::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/recent", get(recent_job_runs))
}

/// GET /api/jobs/recent - the last 50 scheduled job runs, for operational
/// visibility into the ingestion pipeline.
async fn recent_job_runs(State(state): State<AppState>) -> Result<Json<Vec<JobRun>>, AppError> {
    let runs = job_queries::fetch_recent_runs(&state.pool).await?;
    Ok(Json(runs))
}
