use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::stats_service;

/// Nightly refresh of the daily stats cache for yesterday, once all of that
/// day's hours are confirmed. A day without price data is skipped, not a
/// job failure.
pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    let yesterday = Utc::now().date_naive() - Duration::days(1);

    match stats_service::recompute_for(&ctx.pool, yesterday).await {
        Ok(stats) => {
            info!(
                "Refreshed daily stats for {} ({} hours)",
                yesterday, stats.price_count
            );
            Ok(JobResult {
                items_processed: 1,
                items_failed: 0,
            })
        }
        Err(AppError::NotFound(_)) => {
            warn!("No price data for {}, skipping stats refresh", yesterday);
            Ok(JobResult {
                items_processed: 0,
                items_failed: 0,
            })
        }
        Err(e) => Err(e),
    }
}
