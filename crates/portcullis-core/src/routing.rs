//! Routing state machine.
//!
//! Combines the path class, the caller's authentication state and (for
//! workspace-scoped paths) membership existence into exactly one
//! [`RoutingDecision`]. Every redirect target is itself a passthrough for the
//! state that produced it, so the machine never builds redirect chains.

use crate::context::RequestContext;
use crate::paths::{is_under, PathClass};
use crate::redirect::SignInRedirect;
use serde::{Deserialize, Serialize};

/// Caller state as seen by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No verified session.
    Anonymous,
    /// Verified session, zero memberships (or membership unknown).
    AuthenticatedNoWorkspace,
    /// Verified session, at least one membership.
    AuthenticatedWithWorkspace,
}

impl AuthState {
    /// Lowercase label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::AuthenticatedNoWorkspace => "no_workspace",
            Self::AuthenticatedWithWorkspace => "with_workspace",
        }
    }
}

/// Why a redirect was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    /// No session on a protected path.
    SignIn,
    /// Authenticated but not a member of any workspace.
    Onboarding,
    /// Already onboarded; sent to the default landing view.
    Landing,
}

impl RedirectReason {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::Onboarding => "onboarding",
            Self::Landing => "landing",
        }
    }
}

/// The single terminal decision for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Hand the request to the application.
    Passthrough,
    /// Answer with a redirect.
    Redirect {
        /// `Location` header value.
        location: String,
        /// Why the redirect was chosen.
        reason: RedirectReason,
    },
}

impl RoutingDecision {
    /// Returns `true` for redirects.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// The redirect target, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Passthrough => None,
            Self::Redirect { location, .. } => Some(location),
        }
    }

    /// Metric label for the decision kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Redirect { .. } => "redirect",
        }
    }
}

/// The fixed application paths the machine routes between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths {
    /// Entry path of the workspace area, e.g. `/app`.
    pub workspace_root: String,
    /// Onboarding path, e.g. `/app/onboarding`.
    pub onboarding: String,
    /// Default landing view for onboarded users, e.g. `/app/inbox`.
    pub landing: String,
}

impl Default for RoutePaths {
    fn default() -> Self {
        Self {
            workspace_root: "/app".to_string(),
            onboarding: "/app/onboarding".to_string(),
            landing: "/app/inbox".to_string(),
        }
    }
}

impl RoutePaths {
    /// `true` for the workspace root itself and anything beneath it.
    #[must_use]
    pub fn is_workspace_scoped(&self, path: &str) -> bool {
        is_under(path, &self.workspace_root)
    }

    /// `true` for the workspace root, with or without trailing slash.
    #[must_use]
    pub fn is_workspace_root(&self, path: &str) -> bool {
        trim_slash(path) == trim_slash(&self.workspace_root)
    }

    /// `true` for the onboarding path and anything beneath it.
    #[must_use]
    pub fn is_onboarding(&self, path: &str) -> bool {
        is_under(path, &self.onboarding)
    }
}

fn trim_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Stateless decision function over `{path class, auth state, path}`.
#[derive(Debug, Clone, Default)]
pub struct RoutingStateMachine {
    paths: RoutePaths,
    sign_in: SignInRedirect,
}

impl RoutingStateMachine {
    /// Creates a machine.
    #[must_use]
    pub fn new(paths: RoutePaths, sign_in: SignInRedirect) -> Self {
        Self { paths, sign_in }
    }

    /// The route paths in use.
    #[must_use]
    pub const fn paths(&self) -> &RoutePaths {
        &self.paths
    }

    /// The sign-in redirect constructor in use.
    #[must_use]
    pub const fn sign_in(&self) -> &SignInRedirect {
        &self.sign_in
    }

    /// Whether membership must be resolved before deciding this path.
    #[must_use]
    pub fn needs_membership(&self, class: PathClass, path: &str) -> bool {
        class == PathClass::Protected && self.paths.is_workspace_scoped(path)
    }

    /// Decides the request's fate.
    #[must_use]
    pub fn decide(&self, ctx: &RequestContext, class: PathClass, state: AuthState) -> RoutingDecision {
        let path = ctx.path();
        match (class, state) {
            (PathClass::Asset | PathClass::Public, _) => RoutingDecision::Passthrough,
            (PathClass::Protected, AuthState::Anonymous) => self.sign_in.build(ctx),
            (PathClass::Protected, _) if !self.paths.is_workspace_scoped(path) => {
                RoutingDecision::Passthrough
            }
            (PathClass::Protected, AuthState::AuthenticatedNoWorkspace) => {
                if self.paths.is_onboarding(path) {
                    RoutingDecision::Passthrough
                } else {
                    redirect(&self.paths.onboarding, RedirectReason::Onboarding)
                }
            }
            (PathClass::Protected, AuthState::AuthenticatedWithWorkspace) => {
                if self.paths.is_workspace_root(path) || self.paths.is_onboarding(path) {
                    redirect(&self.paths.landing, RedirectReason::Landing)
                } else {
                    RoutingDecision::Passthrough
                }
            }
        }
    }
}

fn redirect(location: &str, reason: RedirectReason) -> RoutingDecision {
    RoutingDecision::Redirect {
        location: location.to_string(),
        reason,
    }
}
