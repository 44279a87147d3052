use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::PriceRecord;

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream API error: {status} {status_text}")]
    Upstream { status: u16, status_text: String },

    #[error("invalid response: {0}")]
    Parse(String),
}

/// Seam over the day-ahead market data source. The bidding area is fixed at
/// construction; the fetch window is the full UTC calendar day of `date`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_day_ahead_prices(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PriceRecord>, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_carries_status_code_and_text() {
        let error = MarketDataError::Upstream {
            status: 500,
            status_text: "Internal Server Error".to_string(),
        };

        let message = error.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("Internal Server Error"));
    }

    #[test]
    fn upstream_error_reports_auth_failures_distinctly() {
        let error = MarketDataError::Upstream {
            status: 401,
            status_text: "Unauthorized".to_string(),
        };

        assert_eq!(error.to_string(), "upstream API error: 401 Unauthorized");
    }
}
