//! Hourly price ingestion job.
//!
//! Runs the same ingestion pass as the `POST /api/cron/fetch-prices`
//! endpoint: fetch day-ahead prices for yesterday, today and tomorrow,
//! reconcile them into storage and sweep the forecast flags. Re-running is
//! harmless because every write is a keyed upsert.

use tracing::info;

use crate::db::store::PgPriceStore;
use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::price_service;

pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("Starting scheduled price ingestion");

    let store = PgPriceStore::new(ctx.pool.clone());
    let summary = price_service::ingest_window(&store, ctx.market_data.as_ref()).await;

    Ok(JobResult {
        items_processed: summary.updated_count,
        items_failed: summary.error_count,
    })
}
