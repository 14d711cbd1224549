//! Test fixtures shared across the Portcullis crates.
//!
//! # Example
//!
//! ```
//! use portcullis_core::fixtures;
//! use portcullis_core::Role;
//!
//! let user = fixtures::user();
//! let rows = vec![fixtures::membership("ws-1", Role::Owner, 0)];
//! assert_eq!(rows[0].workspace.slug, "ws-1");
//! assert!(user.access_token.is_some());
//! ```

use crate::context::{RequestContext, RequestId};
use crate::cookie::Cookies;
use crate::identity::SessionUser;
use crate::membership::{Membership, Role, WorkspaceSummary};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// A verified user with an email and access token.
#[must_use]
pub fn user() -> SessionUser {
    SessionUser::new("user-1")
        .with_email("ada@example.com")
        .with_access_token("access-token-1")
}

/// Fixed reference time for membership ordering.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A membership in `workspace_id`, created `offset_secs` after [`epoch`].
#[must_use]
pub fn membership(workspace_id: &str, role: Role, offset_secs: i64) -> Membership {
    Membership {
        workspace_id: workspace_id.to_string(),
        role,
        workspace: WorkspaceSummary {
            id: workspace_id.to_string(),
            name: format!("Workspace {workspace_id}"),
            slug: workspace_id.to_string(),
        },
        created_at: epoch() + Duration::seconds(offset_secs),
    }
}

/// A request context for `path_and_query` with a raw `Cookie` header.
#[must_use]
pub fn context(path_and_query: &str, cookie_header: &str) -> RequestContext {
    let (path, query) = match path_and_query.split_once('?') {
        Some((p, q)) => (p, Some(q.to_string())),
        None => (path_and_query, None),
    };
    RequestContext::new(RequestId::new(), path, query, Cookies::parse(cookie_header))
}
