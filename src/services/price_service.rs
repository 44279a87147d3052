use std::fmt::Display;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tokio::time::{sleep as async_sleep, Duration as TokioDuration};
use tracing::{error, info, warn};

use crate::db::store::{PriceStore, UpsertOutcome};
use crate::errors::AppError;
use crate::external::market_data::MarketDataProvider;
use crate::models::PriceRecord;

/// Cap on error messages carried back to the caller. The full count is still
/// reported; this only bounds the message list.
pub const MAX_REPORTED_ERRORS: usize = 10;

const INTER_BATCH_DELAY_MS: u64 = 1000;

/// Outcome of an ingestion run: how many records landed, how many writes
/// failed, and a bounded sample of error messages for operational visibility.
#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub updated_count: i32,
    pub error_count: i32,
    pub errors: Vec<String>,
}

impl IngestSummary {
    pub fn record_error(&mut self, context: impl Display, error: impl Display) {
        self.error_count += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("{}: {}", context, error));
        }
    }

    pub fn merge(&mut self, other: IngestSummary) {
        self.updated_count += other.updated_count;
        self.error_count += other.error_count;
        for message in other.errors {
            if self.errors.len() < MAX_REPORTED_ERRORS {
                self.errors.push(message);
            }
        }
    }
}

/// A record whose hour has already passed can never be a forecast, no matter
/// what a late-arriving fetch claims. The flag only moves true -> false.
fn effective_forecast(record: &PriceRecord, now: chrono::DateTime<Utc>) -> bool {
    record.forecast && record.timestamp > now
}

/// Persist a batch of price records. Each upsert is independent: a failed
/// write is reported and the rest of the batch continues; a duplicate key is
/// a successful no-op. Ends with the forecast sweep so past hours lose their
/// forecast flag even when the batch itself was empty.
pub async fn reconcile(store: &dyn PriceStore, records: &[PriceRecord]) -> IngestSummary {
    let mut summary = IngestSummary::default();
    let now = Utc::now();

    for original in records {
        let mut record = original.clone();
        record.forecast = effective_forecast(original, now);

        match store.upsert(&record).await {
            Ok(UpsertOutcome::Written) | Ok(UpsertOutcome::Duplicate) => {
                summary.updated_count += 1;
            }
            Err(e) => {
                error!("Failed to store price for {}: {}", record.timestamp, e);
                summary.record_error(record.timestamp, e);
            }
        }
    }

    match store.sweep_forecast_flags(Utc::now()).await {
        Ok(flipped) if flipped > 0 => {
            info!("Forecast sweep confirmed {} past hours", flipped);
        }
        Ok(_) => {}
        Err(e) => {
            error!("Forecast sweep failed: {}", e);
            summary.record_error("forecast sweep", e);
        }
    }

    summary
}

/// Fetch and reconcile one calendar date. A fetcher failure aborts the whole
/// run for that date; there is no partial price list.
pub async fn ingest_date(
    store: &dyn PriceStore,
    provider: &dyn MarketDataProvider,
    date: NaiveDate,
) -> Result<IngestSummary, AppError> {
    let records = provider.fetch_day_ahead_prices(date).await?;

    if records.is_empty() {
        info!("No prices returned for {}", date);
    }

    Ok(reconcile(store, &records).await)
}

/// The dates a scheduled run covers: recent past, today, near future.
pub fn target_dates(today: NaiveDate) -> [NaiveDate; 3] {
    [today - Duration::days(1), today, today + Duration::days(1)]
}

/// One scheduled ingestion pass over yesterday, today and tomorrow.
///
/// Failures for yesterday and today are real errors. Tomorrow's prices are
/// published day-ahead around 14:00 CET, so a failed or empty fetch for
/// tomorrow is expected for most of the day and only logged.
pub async fn ingest_window(
    store: &dyn PriceStore,
    provider: &dyn MarketDataProvider,
) -> IngestSummary {
    let today = Utc::now().date_naive();
    let [yesterday, today, tomorrow] = target_dates(today);

    let mut summary = IngestSummary::default();

    for date in [yesterday, today] {
        match ingest_date(store, provider, date).await {
            Ok(batch) => summary.merge(batch),
            Err(e) => {
                error!("Price fetch failed for {}: {}", date, e);
                summary.record_error(date, e);
            }
        }
    }

    match ingest_date(store, provider, tomorrow).await {
        Ok(batch) => summary.merge(batch),
        Err(e) => {
            info!("Tomorrow's prices not yet available: {}", e);
        }
    }

    info!(
        "Ingestion window complete: {} records updated, {} errors",
        summary.updated_count, summary.error_count
    );

    summary
}

/// Historical backfill, day by day in batches with a courtesy delay between
/// batches. Per-day fetch failures and per-record write failures are both
/// collected into the summary; nothing aborts the run.
pub async fn backfill_range(
    store: &dyn PriceStore,
    provider: &dyn MarketDataProvider,
    start_year: i32,
    end_year: i32,
    batch_size: i64,
) -> Result<IngestSummary, AppError> {
    let range_start = NaiveDate::from_ymd_opt(start_year, 1, 1)
        .ok_or_else(|| AppError::Validation(format!("invalid start year {}", start_year)))?;
    let range_end = NaiveDate::from_ymd_opt(end_year + 1, 1, 1)
        .ok_or_else(|| AppError::Validation(format!("invalid end year {}", end_year)))?;

    let mut summary = IngestSummary::default();
    let mut batch_start = range_start;

    while batch_start < range_end {
        let batch_end = (batch_start + Duration::days(batch_size)).min(range_end);
        info!("Backfilling batch {} to {}", batch_start, batch_end);

        let mut date = batch_start;
        while date < batch_end {
            match ingest_date(store, provider, date).await {
                Ok(batch) => summary.merge(batch),
                Err(e) => {
                    warn!("Backfill fetch failed for {}: {}", date, e);
                    summary.record_error(date, e);
                }
            }
            date += Duration::days(1);
        }

        async_sleep(TokioDuration::from_millis(INTER_BATCH_DELAY_MS)).await;
        batch_start = batch_end;
    }

    info!(
        "Backfill {}-{} complete: {} records updated, {} errors",
        start_year, end_year, summary.updated_count, summary.error_count
    );

    Ok(summary)
}
