//! Session verification.
//!
//! [`SessionVerifier::verify`] asks the identity provider for the current user
//! exactly once per request. A failing or slow provider never aborts the
//! request: the caller is treated as anonymous and the failure is reported on
//! the returned [`Session`]. Cookies the provider issued before failing are
//! kept.

use std::sync::Arc;
use std::time::Duration;

use portcullis_core::{CookieJar, GateError, RequestContext, SessionUser};
use tracing::{debug, warn};

use crate::error::IdentityError;
use crate::provider::IdentityProvider;

/// Default bound on a provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of session verification.
#[derive(Debug, Default)]
pub struct Session {
    /// The verified user, if any.
    pub user: Option<SessionUser>,
    /// Cookie mutations the provider asked for. Must reach the final response.
    pub cookies: CookieJar,
    /// Set when the provider failed or timed out.
    pub failure: Option<GateError>,
}

impl Session {
    /// An anonymous session with no cookie mutations.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns `true` when a user was verified.
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The verified user or [`GateError::Unauthenticated`].
    pub fn require_user(&self) -> Result<&SessionUser, GateError> {
        self.user.as_ref().ok_or(GateError::Unauthenticated)
    }
}

/// Verifies sessions against an [`IdentityProvider`] with a bounded wait.
#[derive(Clone)]
pub struct SessionVerifier {
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    /// Creates a verifier with [`DEFAULT_PROVIDER_TIMEOUT`].
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Overrides the provider timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured provider timeout.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying provider, for the sign-in and sign-up flows.
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Verifies the request's session. Never fails.
    pub async fn verify(&self, ctx: &RequestContext) -> Session {
        let mut cookies = CookieJar::new();
        let result = tokio::time::timeout(
            self.timeout,
            self.provider.current_user(ctx.cookies(), &mut cookies),
        )
        .await
        .unwrap_or_else(|_| Err(IdentityError::Timeout(self.timeout)));

        match result {
            Ok(user) => {
                debug!(
                    request_id = %ctx.request_id(),
                    authenticated = user.is_some(),
                    refreshed_cookies = cookies.len(),
                    "session verified"
                );
                Session {
                    user,
                    cookies,
                    failure: None,
                }
            }
            Err(err) => {
                warn!(
                    request_id = %ctx.request_id(),
                    error = %err,
                    "identity provider failed, treating caller as unauthenticated"
                );
                Session {
                    user: None,
                    cookies,
                    failure: Some(err.into()),
                }
            }
        }
    }
}
