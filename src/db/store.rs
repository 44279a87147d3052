use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use crate::db::price_queries;
use crate::models::PriceRecord;

#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

/// Outcome of a keyed write. A duplicate key on an insert-only backend means
/// the record is already present and is a successful no-op, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written,
    Duplicate,
}

/// Storage seam for the price reconciler. Each upsert is an independent unit
/// of work keyed by (timestamp, price_area); no cross-record transaction is
/// assumed, so a partially failed batch leaves a valid partial state.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn upsert(&self, record: &PriceRecord) -> Result<UpsertOutcome, StorageError>;

    /// Flip `forecast` to false for every stored record whose hour has
    /// passed. Only ever transitions true -> false, so it is idempotent and
    /// safe to run concurrently with ingestion.
    async fn sweep_forecast_flags(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Postgres-backed store over an explicitly passed pool.
pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    async fn upsert(&self, record: &PriceRecord) -> Result<UpsertOutcome, StorageError> {
        match price_queries::upsert_price(&self.pool, record).await {
            Ok(()) => Ok(UpsertOutcome::Written),
            Err(e) if is_duplicate_key(&e) => Ok(UpsertOutcome::Duplicate),
            Err(e) => Err(StorageError(e.to_string())),
        }
    }

    async fn sweep_forecast_flags(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        price_queries::sweep_forecast_flags(&self.pool, now)
            .await
            .map_err(|e| StorageError(e.to_string()))
    }
}

fn is_duplicate_key(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| is_unique_violation(code.as_ref()))
        .unwrap_or(false)
}

/// Postgres SQLSTATE 23505, unique_violation.
fn is_unique_violation(code: &str) -> bool {
    code == "23505"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_code_is_recognized() {
        assert!(is_unique_violation("23505"));
    }

    #[test]
    fn other_sqlstates_are_not_duplicates() {
        // foreign_key_violation and check_violation must surface as errors.
        assert!(!is_unique_violation("23503"));
        assert!(!is_unique_violation("23514"));
    }

    #[test]
    fn non_database_errors_are_not_duplicates() {
        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
    }
}
