//! The request gate.
//!
//! One stage decides every request, in this order:
//!
//! ```text
//! classify ─ asset ──────────────────────────────────────▶ passthrough (no cookies)
//!    │
//!    ├─ ensure locale cookie
//!    ├─ public ──────────────────────────────────────────▶ passthrough
//!    │
//!    ├─ verify session (provider cookies always kept)
//!    ├─ no user ─────────────────────────────────────────▶ redirect sign-in
//!    ├─ not workspace-scoped ────────────────────────────▶ passthrough
//!    │
//!    └─ workspace state (Unknown counts as none) ─ route ─▶ passthrough | redirect
//! ```
//!
//! Decision and cookie mutations accumulate in a [`GateOutcome`], which is
//! applied to the final response exactly once, redirect or not.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use portcullis_core::{
    AuthState, CookieJar, LocaleResolver, PathClass, PathClassifier, RequestContext,
    RoutingDecision, RoutingStateMachine, WorkspaceState,
};
use portcullis_identity::SessionVerifier;
use portcullis_membership::MembershipResolver;
use tracing::debug;

/// Counter of gate decisions, labelled by `decision` and `reason`.
pub const GATE_DECISIONS_TOTAL: &str = "portcullis_gate_decisions_total";
/// Counter of identity provider failures and timeouts.
pub const PROVIDER_FAILURES_TOTAL: &str = "portcullis_provider_failures_total";
/// Counter of membership query failures seen while routing.
pub const MEMBERSHIP_FAILURES_TOTAL: &str = "portcullis_membership_failures_total";

/// The gate's accumulated result for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    /// The single decision for the request.
    pub decision: RoutingDecision,
    /// Every cookie mutation bound for the response.
    pub cookies: CookieJar,
    passthrough_reason: &'static str,
}

impl GateOutcome {
    fn passthrough(cookies: CookieJar, reason: &'static str) -> Self {
        Self {
            decision: RoutingDecision::Passthrough,
            cookies,
            passthrough_reason: reason,
        }
    }

    fn decided(decision: RoutingDecision, cookies: CookieJar, reason: &'static str) -> Self {
        Self {
            decision,
            cookies,
            passthrough_reason: reason,
        }
    }

    /// Metric label for why the decision was taken.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match &self.decision {
            RoutingDecision::Redirect { reason, .. } => reason.as_str(),
            RoutingDecision::Passthrough => self.passthrough_reason,
        }
    }

    /// Writes the pending cookies onto `response`.
    #[must_use]
    pub fn apply(&self, mut response: Response) -> Response {
        self.cookies.apply_to(response.headers_mut());
        response
    }
}

/// The gate stage.
///
/// Holds the pure components and the two collaborators. Cheap to share:
/// the collaborators sit behind `Arc`s.
#[derive(Debug, Clone)]
pub struct GateMiddleware {
    classifier: PathClassifier,
    locale: LocaleResolver,
    verifier: SessionVerifier,
    resolver: MembershipResolver,
    machine: RoutingStateMachine,
}

impl GateMiddleware {
    /// Creates a gate with default paths and locales.
    pub fn new(verifier: SessionVerifier, resolver: MembershipResolver) -> Self {
        Self {
            classifier: PathClassifier::default(),
            locale: LocaleResolver::default(),
            verifier,
            resolver,
            machine: RoutingStateMachine::default(),
        }
    }

    /// Replaces the path classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: PathClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replaces the locale resolver.
    #[must_use]
    pub fn with_locale(mut self, locale: LocaleResolver) -> Self {
        self.locale = locale;
        self
    }

    /// Replaces the routing state machine.
    #[must_use]
    pub fn with_routing(mut self, machine: RoutingStateMachine) -> Self {
        self.machine = machine;
        self
    }

    /// The locale resolver in use.
    pub fn locale(&self) -> &LocaleResolver {
        &self.locale
    }

    /// The membership resolver in use.
    pub fn resolver(&self) -> &MembershipResolver {
        &self.resolver
    }

    /// Decides `request`, recording the user, locale and membership state
    /// on `ctx` along the way.
    pub async fn evaluate(&self, request: &RequestContext, ctx: &mut MiddlewareContext) -> GateOutcome {
        let path = request.path();
        let class = self.classifier.classify(path);
        if class == PathClass::Asset {
            return GateOutcome::passthrough(CookieJar::new(), "asset");
        }

        let mut cookies = CookieJar::new();
        let locale_cookie = request.cookie(self.locale.cookie_name());
        self.locale.ensure_cookie(locale_cookie, &mut cookies);
        ctx.set_locale(self.locale.resolve(locale_cookie));

        if class == PathClass::Public {
            return GateOutcome::passthrough(cookies, "public");
        }

        let session = self.verifier.verify(request).await;
        cookies.merge(session.cookies);
        if session.failure.is_some() {
            metrics::counter!(PROVIDER_FAILURES_TOTAL).increment(1);
        }

        let Some(user) = session.user else {
            let decision = self.machine.decide(request, class, AuthState::Anonymous);
            return GateOutcome::decided(decision, cookies, "anonymous");
        };

        if !self.machine.needs_membership(class, path) {
            ctx.set_user(user);
            return GateOutcome::passthrough(cookies, "authenticated");
        }

        let state = self.resolver.workspace_state(&user).await;
        if state == WorkspaceState::Unknown {
            metrics::counter!(MEMBERSHIP_FAILURES_TOTAL).increment(1);
        }
        ctx.set_user(user);
        ctx.set_workspace(state);

        let decision = self.machine.decide(request, class, AuthState::from(state));
        GateOutcome::decided(decision, cookies, "member")
    }

    fn record(&self, request: &RequestContext, outcome: &GateOutcome) {
        metrics::counter!(
            GATE_DECISIONS_TOTAL,
            "decision" => outcome.decision.kind(),
            "reason" => outcome.reason()
        )
        .increment(1);

        debug!(
            request_id = %request.request_id(),
            path = %request.path(),
            decision = outcome.decision.kind(),
            reason = outcome.reason(),
            location = outcome.decision.location().unwrap_or_default(),
            cookies = outcome.cookies.len(),
            "gate decided"
        );
    }
}

impl Middleware for GateMiddleware {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_ctx = RequestContext::from_request(ctx.request_id(), &request);
            let outcome = self.evaluate(&request_ctx, ctx).await;
            self.record(&request_ctx, &outcome);
            ctx.set_decision(outcome.decision.clone());

            let response = match &outcome.decision {
                RoutingDecision::Passthrough => next.run(ctx, request).await,
                RoutingDecision::Redirect { location, .. } => Response::redirect(location),
            };
            outcome.apply(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::{fixtures, RedirectReason, Role};
    use portcullis_identity::InMemoryIdentityProvider;
    use portcullis_membership::InMemoryMembershipStore;
    use std::sync::Arc;

    struct Harness {
        provider: InMemoryIdentityProvider,
        store: InMemoryMembershipStore,
        gate: GateMiddleware,
    }

    fn harness() -> Harness {
        let provider = InMemoryIdentityProvider::new();
        let store = InMemoryMembershipStore::new();
        let gate = GateMiddleware::new(
            SessionVerifier::new(Arc::new(provider.clone())),
            MembershipResolver::new(Arc::new(store.clone())),
        );
        provider.insert_session("tok", fixtures::user());
        Harness { provider, store, gate }
    }

    async fn evaluate(h: &Harness, path: &str, cookies: &str) -> (GateOutcome, MiddlewareContext) {
        let mut ctx = MiddlewareContext::new();
        let outcome = h.gate.evaluate(&fixtures::context(path, cookies), &mut ctx).await;
        (outcome, ctx)
    }

    #[tokio::test]
    async fn test_asset_skips_everything() {
        let h = harness();
        let (outcome, ctx) = evaluate(&h, "/favicon.ico", "").await;

        assert_eq!(outcome.decision, RoutingDecision::Passthrough);
        assert!(outcome.cookies.is_empty());
        assert_eq!(outcome.reason(), "asset");
        assert!(ctx.locale().is_none());
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_public_path_stamps_locale_only() {
        let h = harness();
        let (outcome, ctx) = evaluate(&h, "/auth/sign-in", "").await;

        assert_eq!(outcome.decision, RoutingDecision::Passthrough);
        assert_eq!(outcome.cookies.len(), 1);
        assert!(outcome.cookies.contains("locale"));
        assert_eq!(ctx.locale().map(|l| l.as_str()), Some("en"));
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_protected_redirects_to_sign_in() {
        let h = harness();
        let (outcome, ctx) = evaluate(&h, "/app/inbox?tab=unread", "locale=es").await;

        assert_eq!(outcome.decision.location(), Some("/?next=%2Fapp%2Finbox%3Ftab%3Dunread"));
        assert_eq!(outcome.reason(), "sign_in");
        assert!(outcome.cookies.is_empty());
        assert!(ctx.user().is_none());
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_unscoped_protected_path_skips_membership() {
        let h = harness();
        let (outcome, ctx) = evaluate(&h, "/settings", "portcullis-session=tok; locale=en").await;

        assert_eq!(outcome.decision, RoutingDecision::Passthrough);
        assert_eq!(outcome.reason(), "authenticated");
        assert!(ctx.user().is_some());
        assert!(ctx.workspace().is_none());
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_member_routing() {
        let h = harness();
        let (outcome, _) = evaluate(&h, "/app", "portcullis-session=tok; locale=en").await;
        assert_eq!(outcome.decision.location(), Some("/app/onboarding"));

        h.store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
        let (outcome, ctx) = evaluate(&h, "/app/onboarding", "portcullis-session=tok; locale=en").await;
        assert!(matches!(
            outcome.decision,
            RoutingDecision::Redirect { reason: RedirectReason::Landing, .. }
        ));
        assert_eq!(ctx.workspace(), Some(WorkspaceState::Some(1)));

        let (outcome, _) = evaluate(&h, "/app/inbox", "portcullis-session=tok; locale=en").await;
        assert_eq!(outcome.decision, RoutingDecision::Passthrough);
        assert_eq!(outcome.reason(), "member");
    }

    #[tokio::test]
    async fn test_membership_failure_routes_to_onboarding() {
        let h = harness();
        h.store.insert("user-1", fixtures::membership("ws-1", Role::Owner, 0));
        h.store.set_unavailable(true);

        let (outcome, ctx) = evaluate(&h, "/app/inbox", "portcullis-session=tok; locale=en").await;
        assert_eq!(outcome.decision.location(), Some("/app/onboarding"));
        assert_eq!(ctx.workspace(), Some(WorkspaceState::Unknown));
    }

    #[tokio::test]
    async fn test_provider_failure_is_anonymous() {
        let h = harness();
        h.provider.set_unavailable(true);

        let (outcome, _) = evaluate(&h, "/app", "portcullis-session=tok; locale=en").await;
        assert_eq!(outcome.decision.location(), Some("/?next=%2Fapp"));
    }

    #[tokio::test]
    async fn test_rotated_session_cookie_follows_redirect() {
        let h = harness();
        h.provider.rotate_on_use("tok", "tok-2");

        let (outcome, _) = evaluate(&h, "/app", "portcullis-session=tok").await;
        assert_eq!(outcome.decision.location(), Some("/app/onboarding"));
        let names: Vec<_> = outcome.cookies.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["locale", "portcullis-session"]);
    }

    #[tokio::test]
    async fn test_apply_appends_each_cookie() {
        let h = harness();
        h.provider.rotate_on_use("tok", "tok-2");
        let (outcome, _) = evaluate(&h, "/app", "portcullis-session=tok").await;

        let response = outcome.apply(Response::redirect("/app/onboarding"));
        assert_eq!(response.headers().get_all(http::header::SET_COOKIE).iter().count(), 2);
    }
}
