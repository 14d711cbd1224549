//! # Portcullis Core
//!
//! Domain types and the pure components of the Portcullis request gate.
//!
//! - [`PathClassifier`] - sorts paths into asset, public and protected
//! - [`LocaleResolver`] - resolves the locale cookie and stamps a default
//! - [`SignInRedirect`] - builds sign-in redirects with a continuation target
//! - [`RoutingStateMachine`] - picks the single routing decision per request
//! - [`CookieJar`] - cookie mutations bound for the final response
//! - [`secrets_match`] - timing-safe shared-secret comparison
//! - [`GateError`] - the gate's error taxonomy
//!
//! Nothing here performs I/O. Collaborators (identity provider, membership
//! store) live in their own crates.

#![doc(html_root_url = "https://docs.rs/portcullis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
pub mod cookie;
mod error;
pub mod fixtures;
mod identity;
pub mod locale;
mod membership;
pub mod paths;
pub mod redirect;
pub mod routing;
mod secret;

pub use context::{RequestContext, RequestId};
pub use cookie::{CookieJar, CookieMutation, Cookies, SameSite, SetCookie};
pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, GateError, GateResult};
pub use identity::SessionUser;
pub use locale::{Locale, LocaleResolver};
pub use membership::{Membership, Role, WorkspaceState, WorkspaceSummary};
pub use paths::{PathClass, PathClassifier};
pub use redirect::{sanitize_continuation, SignInRedirect};
pub use routing::{AuthState, RedirectReason, RoutePaths, RoutingDecision, RoutingStateMachine};
pub use secret::{bearer_token, secrets_match};
