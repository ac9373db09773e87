use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for tradewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// API key missing or rejected by the remote service.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The remote service answered 429.
    #[error("Rate limited by remote service{}", fmt_retry_after(.retry_after))]
    RateLimitError { retry_after: Option<Duration> },

    /// Timeout, connection failure or 5xx. Worth retrying.
    #[error("Transient network error: {0}")]
    TransientNetworkError(String),

    /// The response did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponseError(String),

    /// Input rejected before it reached storage.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Connection, permission or transaction failure in the store.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("Export error: {0}")]
    ExportError(String),
}

fn fmt_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl AppError {
    /// Returns true if this error is transient and worth retrying locally.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientNetworkError(_))
    }

    /// Returns true if an extraction run should fall back to sample data
    /// instead of aborting when it sees this error.
    pub fn should_fall_back(&self) -> bool {
        matches!(
            self,
            AppError::AuthError(_)
                | AppError::RateLimitError { .. }
                | AppError::TransientNetworkError(_)
                | AppError::MalformedResponseError(_)
        )
    }

    /// Returns true if retrying the same API with other parameters is pointless
    /// for the rest of the run.
    pub fn stops_live_extraction(&self) -> bool {
        matches!(
            self,
            AppError::AuthError(_) | AppError::RateLimitError { .. }
        )
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::ExportError(err.to_string())
    }
}
