//! Error types for the batch analysis pipeline.
//!
//! Only configuration problems abort a run. Backend failures are recovered
//! per batch and surface in the report, never as an `Err` to the caller.

use std::time::Duration;

use thiserror::Error;

/// Malformed processing configuration, detected before any record is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No tiers configured (a catch-all tier is required)")]
    MissingCatchAllTier,

    #[error("Batch size bounds out of order: min={min}, base={base}, max={max}")]
    BatchSizeBounds { min: usize, base: usize, max: usize },

    #[error("{0} must be at least 1")]
    ZeroValue(&'static str),

    #[error("Duplicate tier name: {0}")]
    DuplicateTierName(String),

    #[error("Duplicate tier priority {priority} (tiers '{first}' and '{second}')")]
    DuplicateTierPriority {
        priority: u32,
        first: String,
        second: String,
    },

    #[error("Tier '{0}' has a batch size of 0")]
    ZeroTierBatchSize(String),

    #[error("Tier '{0}' has an empty keyword")]
    EmptyKeyword(String),
}

/// Top-level error returned by the analyzer entry points.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A raw upstream record that could not be turned into a `LogEntry`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Record is not a JSON object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Empty message")]
    EmptyMessage,

    #[error("Unrecognized level: {0}")]
    InvalidLevel(String),

    #[error("Unparsable timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Errors reported by an analysis backend for a single dispatch attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend is not reachable at {0}")]
    Connection(String),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("Batch rejected by backend: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Whether the same batch payload is worth sending again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_)
            | Self::Connection(_)
            | Self::Http(_)
            | Self::MalformedResponse(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected(_) => false,
        }
    }
}
