use axum::response::IntoResponse;
use reqwest::StatusCode;
use thiserror::Error;

use crate::db::store::StorageError;
use crate::external::market_data::MarketDataError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            AppError::Upstream(msg) | AppError::Parse(msg) => {
                (StatusCode::BAD_GATEWAY, msg).into_response()
            }
            AppError::Config(_) | AppError::Db(_) | AppError::Storage(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<MarketDataError> for AppError {
    fn from(value: MarketDataError) -> Self {
        match value {
            MarketDataError::Config(msg) => AppError::Config(msg),
            MarketDataError::Parse(msg) => AppError::Parse(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        AppError::Storage(value.to_string())
    }
}
