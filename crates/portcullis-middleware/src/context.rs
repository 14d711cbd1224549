//! Middleware context types.
//!
//! The [`MiddlewareContext`] carries state through the middleware pipeline.
//! It is separate from [`RequestContext`](portcullis_core::RequestContext),
//! which is the immutable snapshot of what the client sent; this one is
//! enriched as stages run (verified user, resolved locale, the gate's
//! decision) and is what the application handler reads from.

use portcullis_core::{Locale, RequestId, RoutingDecision, SessionUser, WorkspaceState};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

/// Context that flows through the middleware pipeline.
///
/// # Example
///
/// ```
/// use portcullis_middleware::context::MiddlewareContext;
/// use portcullis_core::SessionUser;
///
/// let mut ctx = MiddlewareContext::new();
/// assert!(ctx.user().is_none());
///
/// ctx.set_user(SessionUser::new("user-123"));
/// assert_eq!(ctx.user().map(|u| u.id.as_str()), Some("user-123"));
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// The verified user, once the gate has run.
    user: Option<SessionUser>,

    /// The resolved locale, once the gate has run.
    locale: Option<Locale>,

    /// Membership existence, only resolved for workspace-scoped paths.
    workspace: Option<WorkspaceState>,

    /// The gate's decision for this request.
    decision: Option<RoutingDecision>,

    /// When the request started processing.
    started_at: Instant,

    /// Type-erased extension data.
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MiddlewareContext {
    /// Creates a new middleware context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            user: None,
            locale: None,
            workspace: None,
            decision: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Sets the request ID.
    ///
    /// This should only be called by the request id stage.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the verified user, if any.
    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Sets the verified user.
    pub fn set_user(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    /// Returns the resolved locale, if the gate ran.
    #[must_use]
    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// Sets the resolved locale.
    pub fn set_locale(&mut self, locale: Locale) {
        self.locale = Some(locale);
    }

    /// Returns the membership state, if it was resolved.
    #[must_use]
    pub fn workspace(&self) -> Option<WorkspaceState> {
        self.workspace
    }

    /// Sets the membership state.
    pub fn set_workspace(&mut self, state: WorkspaceState) {
        self.workspace = Some(state);
    }

    /// Returns the gate's decision, if the gate ran.
    #[must_use]
    pub fn decision(&self) -> Option<&RoutingDecision> {
        self.decision.as_ref()
    }

    /// Records the gate's decision.
    ///
    /// The first decision wins; later calls are ignored so nothing
    /// downstream can amend it.
    pub fn set_decision(&mut self, decision: RoutingDecision) {
        if self.decision.is_none() {
            self.decision = Some(decision);
        }
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed extension value.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_middleware::context::MiddlewareContext;
    ///
    /// struct Workflow(&'static str);
    ///
    /// let mut ctx = MiddlewareContext::new();
    /// ctx.set_extension(Workflow("wf-1"));
    /// assert_eq!(ctx.get_extension::<Workflow>().map(|w| w.0), Some("wf-1"));
    /// ```
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Checks if an extension of the given type exists.
    #[must_use]
    pub fn has_extension<T: Send + Sync + 'static>(&self) -> bool {
        self.extensions.contains_key(&TypeId::of::<T>())
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}
