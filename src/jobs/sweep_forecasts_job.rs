use chrono::Utc;
use tracing::info;

use crate::db::store::{PgPriceStore, PriceStore};
use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};

/// Confirm every stored forecast whose hour has passed. The ingestion job
/// does this too, but prices must stop being forecasts on the hour even when
/// no fetch has run since.
pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    let store = PgPriceStore::new(ctx.pool.clone());
    let flipped = store.sweep_forecast_flags(Utc::now()).await?;

    if flipped > 0 {
        info!("Sweep confirmed {} forecast records", flipped);
    }

    Ok(JobResult {
        items_processed: flipped as i32,
        items_failed: 0,
    })
}
