//! Error types for the membership crate.

use portcullis_core::GateError;
use std::time::Duration;
use thiserror::Error;

/// Result type for membership store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while querying the membership store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The request never produced a response.
    #[error("membership store transport error: {0}")]
    Transport(String),

    /// The store did not answer in time.
    #[error("membership store timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with a non-success status (policy rejection,
    /// bad request, outage).
    #[error("membership store returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message returned by the store.
        message: String,
    },

    /// A row did not match the expected schema.
    #[error("membership row schema mismatch: {0}")]
    Schema(String),

    /// The store is deliberately offline (in-memory store only).
    #[error("membership store unavailable")]
    Unavailable,
}

impl StoreError {
    /// Whether the store rejected the caller (401/403) rather than failing.
    pub const fn is_policy_rejection(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Schema(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        GateError::membership_query_failed(err.to_string())
    }
}
