//! Sign-in redirect construction.
//!
//! The continuation parameter carries the original path and query so the
//! sign-in flow can send the user back. The value is form-urlencoded exactly
//! once; decoding the `Location` query yields the original `path?query`.

use crate::context::RequestContext;
use crate::error::GateError;
use crate::routing::{RedirectReason, RoutingDecision};

/// Default name of the continuation parameter.
pub const DEFAULT_CONTINUATION_PARAM: &str = "next";

/// Builds redirects to the sign-in entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRedirect {
    sign_in_path: String,
    param: String,
    fallback: String,
}

impl Default for SignInRedirect {
    fn default() -> Self {
        Self::new("/", DEFAULT_CONTINUATION_PARAM, "/app/inbox")
    }
}

impl SignInRedirect {
    /// Creates a constructor.
    ///
    /// `fallback` replaces continuation targets that are not safe local paths.
    #[must_use]
    pub fn new(
        sign_in_path: impl Into<String>,
        param: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            sign_in_path: sign_in_path.into(),
            param: param.into(),
            fallback: fallback.into(),
        }
    }

    /// The sign-in entry path.
    #[must_use]
    pub fn sign_in_path(&self) -> &str {
        &self.sign_in_path
    }

    /// The continuation parameter name.
    #[must_use]
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Builds the redirect decision for a request.
    #[must_use]
    pub fn build(&self, ctx: &RequestContext) -> RoutingDecision {
        RoutingDecision::Redirect {
            location: self.location_for(&ctx.path_and_query()),
            reason: RedirectReason::SignIn,
        }
    }

    /// Builds the `Location` value for a continuation target.
    ///
    /// Unsafe targets are replaced by the fallback path.
    #[must_use]
    pub fn location_for(&self, target: &str) -> String {
        let target = match validate_continuation(target) {
            Ok(target) => target,
            Err(err) => {
                tracing::debug!(error = %err, fallback = %self.fallback, "continuation replaced");
                self.fallback.as_str()
            }
        };
        let pairs = [(self.param.as_str(), target)];
        match serde_urlencoded::to_string(pairs) {
            Ok(query) => format!("{}?{query}", self.sign_in_path),
            Err(_) => self.sign_in_path.clone(),
        }
    }

    /// Resolves a `next` value received by the sign-in flow back to a safe
    /// local path.
    #[must_use]
    pub fn sanitize(&self, raw: Option<&str>) -> String {
        sanitize_continuation(raw, &self.fallback)
    }
}

/// Checks that a continuation target is a local absolute path.
///
/// Rejects targets that do not start with `/`, protocol-relative targets
/// (`//host`, `/\host`) and anything containing control characters.
pub fn validate_continuation(target: &str) -> Result<&str, GateError> {
    let invalid = || GateError::InvalidContinuationTarget {
        target: target.chars().filter(|c| !c.is_control()).take(128).collect(),
    };
    if !target.starts_with('/') || target.starts_with("//") || target.starts_with("/\\") {
        return Err(invalid());
    }
    if target.chars().any(char::is_control) {
        return Err(invalid());
    }
    Ok(target)
}

/// Returns `raw` when it is a safe continuation target, otherwise `fallback`.
#[must_use]
pub fn sanitize_continuation(raw: Option<&str>, fallback: &str) -> String {
    raw.and_then(|r| validate_continuation(r).ok())
        .unwrap_or(fallback)
        .to_string()
}
