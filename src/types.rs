//! Error types for gavel
//!
//! Three error classes flow through a sync run: per-record errors (collected
//! into a batch's `errors`, never propagated as `SyncError`), phase errors
//! (this enum, aborts the run), and advisory warnings (logged only).

/// Main error type for sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Fetch failed with HTTP {status}: {body}")]
    Fetch { status: u16, body: String },

    #[error("Rate limited by upstream, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

// Implement From conversions for common error types

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
