//! Background jobs executed by the job scheduler service.
//!
//! - `fetch_prices_job` - ingests day-ahead prices for yesterday, today and
//!   tomorrow (hourly)
//! - `sweep_forecasts_job` - confirms forecast records whose hour has passed
//!   (hourly)
//! - `daily_stats_job` - recomputes the daily stats cache for yesterday
//!   (nightly)
//!
//! Jobs are idempotent and safe to re-run: ingestion is a keyed upsert, the
//! sweep only ever flips forecast true -> false, and stats are recomputed
//! from scratch. Every run is recorded in the `job_runs` table.

pub mod daily_stats_job;
pub mod fetch_prices_job;
pub mod sweep_forecasts_job;
