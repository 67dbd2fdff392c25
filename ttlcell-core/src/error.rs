//! Error types for ttlcell.
//!
//! Producer failures are never wrapped here: cells hand the caller's own
//! error type straight back. This enum covers everything around the cells.

use thiserror::Error;

/// Result type alias using `TtlError`.
pub type Result<T> = std::result::Result<T, TtlError>;

/// Main error type for ttlcell operations.
#[derive(Debug, Error)]
pub enum TtlError {
    /// A negative TTL was supplied while the reject policy is active.
    #[error("Negative TTL: {0}ms")]
    NegativeTtl(i64),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TtlError {
    /// Returns true if this error stems from invalid settings.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TtlError::NegativeTtl(_) | TtlError::ConfigError(_) | TtlError::JsonError(_)
        )
    }
}
