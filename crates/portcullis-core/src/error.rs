//! Error types for the gate.
//!
//! [`GateError`] is the taxonomy shared by every gate component. Inside the
//! gate none of these reach the client as a message: they resolve to a
//! redirect or a passthrough. The server's own endpoints (scheduled trigger,
//! workflow deletion) render them through [`ErrorEnvelope`].

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`GateError`].
pub type GateResult<T> = Result<T, GateError>;

/// Categories of errors for classification and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request validation errors (invalid input).
    Validation,
    /// Authentication errors (invalid/missing credentials).
    Authentication,
    /// Authorization errors (permission denied).
    Authorization,
    /// External service errors (downstream failures).
    External,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::External => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Gate error taxonomy.
///
/// # Example
///
/// ```
/// use portcullis_core::{ErrorCategory, GateError};
///
/// let err = GateError::provider_unavailable("connection refused");
/// assert_eq!(err.category(), ErrorCategory::External);
/// assert!(err.is_unauthenticated());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// No valid session.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The identity provider failed or timed out.
    #[error("Identity provider unavailable: {message}")]
    ProviderUnavailable {
        /// Human-readable error message.
        message: String,
    },

    /// The membership query failed (policy rejection, schema mismatch,
    /// transport failure or timeout).
    #[error("Membership query failed: {message}")]
    MembershipQueryFailed {
        /// Human-readable error message.
        message: String,
    },

    /// A continuation target is not a safe local path.
    #[error("Invalid continuation target: {target}")]
    InvalidContinuationTarget {
        /// The rejected target, control characters removed.
        target: String,
    },

    /// The caller lacks access to the requested workspace resource.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message.
        message: String,
    },
}

impl GateError {
    /// Creates a provider-unavailable error.
    #[must_use]
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            message: message.into(),
        }
    }

    /// Creates a membership-query-failed error.
    #[must_use]
    pub fn membership_query_failed(message: impl Into<String>) -> Self {
        Self::MembershipQueryFailed {
            message: message.into(),
        }
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Whether the gate routes this error as an anonymous caller.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::ProviderUnavailable { .. })
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated => ErrorCategory::Authentication,
            Self::ProviderUnavailable { .. } | Self::MembershipQueryFailed { .. } => {
                ErrorCategory::External
            }
            Self::InvalidContinuationTarget { .. } => ErrorCategory::Validation,
            Self::Forbidden { .. } => ErrorCategory::Authorization,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::MembershipQueryFailed { .. } => "MEMBERSHIP_QUERY_FAILED",
            Self::InvalidContinuationTarget { .. } => "INVALID_CONTINUATION_TARGET",
            Self::Forbidden { .. } => "FORBIDDEN",
        }
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// External failures carry a generic message; details stay in the logs.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let message = match self.category() {
            ErrorCategory::External => "Upstream service unavailable".to_string(),
            _ => self.to_string(),
        };
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                category: self.category(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
}
