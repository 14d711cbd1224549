//! Request context types.
//!
//! The [`RequestContext`] is the immutable per-request bundle the gate reads:
//! request id, path, raw query and inbound cookies. It is built once at
//! request entry and never mutated afterwards.

use crate::cookie::Cookies;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use portcullis_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a request id from an inbound header value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Per-request data the gate decides on.
///
/// # Example
///
/// ```
/// use portcullis_core::{RequestContext, RequestId};
///
/// let req = http::Request::builder()
///     .uri("/app/inbox?tab=unread")
///     .header("cookie", "locale=es")
///     .body(())
///     .unwrap();
///
/// let ctx = RequestContext::from_request(RequestId::new(), &req);
/// assert_eq!(ctx.path(), "/app/inbox");
/// assert_eq!(ctx.query(), Some("tab=unread"));
/// assert_eq!(ctx.cookie("locale"), Some("es"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    path: String,
    query: Option<String>,
    cookies: Cookies,
    started_at: Instant,
}

impl RequestContext {
    /// Creates a context from its parts.
    ///
    /// An empty query is normalised to `None`.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        path: impl Into<String>,
        query: Option<String>,
        cookies: Cookies,
    ) -> Self {
        let path = path.into();
        Self {
            request_id,
            path: if path.is_empty() { "/".to_string() } else { path },
            query: query.filter(|q| !q.is_empty()),
            cookies,
            started_at: Instant::now(),
        }
    }

    /// Builds the context from an HTTP request's URI and `Cookie` headers.
    #[must_use]
    pub fn from_request<B>(request_id: RequestId, request: &http::Request<B>) -> Self {
        let uri = request.uri();
        Self::new(
            request_id,
            uri.path(),
            uri.query().map(ToString::to_string),
            Cookies::from_headers(request.headers()),
        )
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The request path, without query.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, if non-empty.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Path plus `?query` when a query is present.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    /// The inbound cookies.
    #[must_use]
    pub const fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    /// Looks up a single inbound cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }

    /// Returns the elapsed time since the context was built.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
