mod app;
mod db;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use crate::external::entsoe::EntsoEClient;
use crate::external::market_data::MarketDataProvider;
use crate::services::job_scheduler_service::JobSchedulerService;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    logging::init_logging(logging::LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let market_data: Arc<dyn MarketDataProvider> = Arc::new(
        EntsoEClient::from_env().map_err(|e| anyhow::anyhow!("market data client: {}", e))?,
    );

    let cron_secret = std::env::var("CRON_SECRET").ok();
    if cron_secret.is_none() {
        tracing::warn!("CRON_SECRET not set - cron endpoints will reject all requests");
    }

    let state = AppState {
        pool: pool.clone(),
        market_data: market_data.clone(),
        cron_secret,
    };

    // In-process scheduler for the hourly ingestion, the forecast sweep and
    // the nightly stats refresh. Deployments that trigger ingestion through
    // the cron endpoints instead can disable it.
    let scheduler_enabled = std::env::var("SCHEDULER_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .parse::<bool>()
        .unwrap_or(true);

    let mut _scheduler = None;
    if scheduler_enabled {
        let mut service = JobSchedulerService::new(pool, market_data).await?;
        service.start().await?;
        _scheduler = Some(service);
    } else {
        tracing::info!("Job scheduler disabled (SCHEDULER_ENABLED=false)");
    }

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3000);

    let app = app::create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Spottisähkö backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
