//! Error types for the Ingestion Service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("API error: {code} - {message}")]
    ApiError {
        code: String,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),
}

/// Failures raised by a [`Store`](crate::store::Store) implementation.
///
/// `Duplicate` and `Malformed` are per-record and recovered by the inserter;
/// everything else means the store itself is unusable for this invocation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate key {key} in {collection}")]
    Duplicate {
        collection: &'static str,
        key: String,
    },

    #[error("Malformed record for {collection}: {reason}")]
    Malformed {
        collection: &'static str,
        reason: String,
    },

    #[error("Database unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the failure only concerns the record being written.
    pub fn is_record_level(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. } | StoreError::Malformed { .. })
    }

    /// Metric label for insert failures.
    pub fn reason(&self) -> &'static str {
        match self {
            StoreError::Duplicate { .. } => "duplicate",
            StoreError::Malformed { .. } => "malformed",
            StoreError::Unavailable(_) | StoreError::Backend(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
