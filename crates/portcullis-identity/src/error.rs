//! Error types for the identity crate.

use portcullis_core::GateError;
use std::time::Duration;
use thiserror::Error;

/// Result type for identity provider operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that can occur while talking to the identity provider.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// The request never produced a response.
    #[error("identity provider transport error: {0}")]
    Transport(String),

    /// The provider did not answer in time.
    #[error("identity provider timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with an unexpected status.
    #[error("identity provider returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Body or message returned by the provider.
        message: String,
    },

    /// The provider answered with a body we could not interpret.
    #[error("invalid identity provider response: {0}")]
    InvalidResponse(String),

    /// The provider refused the credentials (sign-in / sign-up).
    #[error("{message}")]
    Rejected {
        /// Provider message, suitable for showing on the sign-in form.
        message: String,
    },

    /// The provider is deliberately offline (in-memory provider only).
    #[error("identity provider unavailable")]
    Unavailable,
}

impl IdentityError {
    /// Create a rejected-credentials error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Whether the failure was the provider's fault rather than the caller's.
    pub const fn is_provider_failure(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<IdentityError> for GateError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected { .. } => GateError::Unauthenticated,
            other => GateError::provider_unavailable(other.to_string()),
        }
    }
}
