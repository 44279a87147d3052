use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::db::job_queries;
use crate::errors::AppError;
use crate::external::market_data::MarketDataProvider;
use crate::jobs::{daily_stats_job, fetch_prices_job, sweep_forecasts_job};

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub pool: PgPool,
    pub market_data: Arc<dyn MarketDataProvider>,
}

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(
        pool: PgPool,
        market_data: Arc<dyn MarketDataProvider>,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Config(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            context: JobContext { pool, market_data },
        })
    }

    /// Register and start all scheduled jobs.
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        // Test mode shrinks every schedule so jobs can be observed quickly.
        let test_mode = std::env::var("JOB_SCHEDULER_TEST_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        if test_mode {
            info!("⚠️  JOB SCHEDULER IN TEST MODE - jobs run every few minutes!");
        }

        // Format: sec min hour day month weekday
        let fetch_schedule = if test_mode { "0 */1 * * * *" } else { "0 5 * * * *" };
        let fetch_desc = if test_mode { "Every minute (TEST MODE)" } else { "Hourly at :05" };
        self.schedule_job(fetch_schedule, "fetch_prices", fetch_desc, fetch_prices_job::run)
            .await?;

        self.schedule_job(
            "0 0 * * * *",
            "sweep_forecasts",
            "Hourly at :00",
            sweep_forecasts_job::run,
        )
        .await?;

        let stats_schedule = if test_mode { "0 */5 * * * *" } else { "0 15 0 * * *" };
        let stats_desc = if test_mode { "Every 5 minutes (TEST MODE)" } else { "Daily at 00:15 UTC" };
        self.schedule_job(stats_schedule, "refresh_daily_stats", stats_desc, daily_stats_job::run)
            .await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Config(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Config(format!("Failed to stop scheduler: {}", e)))
    }

    /// Helper to schedule a job with run tracking in `job_runs`.
    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();

        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                let pool = context.pool.clone();
                execute_job_with_tracking(&pool, job_name, context, job_fn).await;
            })
        })
        .map_err(|e| AppError::Config(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Config(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled job {} ({})", job_name, description);
        Ok(())
    }
}

// Job tracking wrapper
async fn execute_job_with_tracking<F, Fut>(
    pool: &PgPool,
    job_name: &str,
    context: JobContext,
    job_fn: F,
) where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    let started_at = Utc::now();

    let job_id = match job_queries::record_job_start(pool, job_name).await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to record job start for {}: {}", job_name, e);
            return;
        }
    };

    let result = job_fn(context).await;
    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    match result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );

            if let Err(e) = job_queries::record_job_success(
                pool,
                job_id,
                job_result.items_processed,
                job_result.items_failed,
                duration_ms,
            )
            .await
            {
                error!("Failed to record job success: {}", e);
            }
        }
        Err(e) => {
            error!("❌ Job failed: {} - {}", job_name, e);

            if let Err(e) =
                job_queries::record_job_failure(pool, job_id, &e.to_string(), duration_ms).await
            {
                error!("Failed to record job failure: {}", e);
            }
        }
    }
}
