//! Request dispatch.
//!
//! Health checks are answered before the pipeline. Everything else runs
//! through request id → telemetry → gate, and what the gate lets through is
//! routed to the scheduler trigger, the workflow endpoint, or the application
//! handler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use portcullis_config::PortcullisConfig;
use portcullis_core::RoutingStateMachine;
use portcullis_identity::{HttpIdentityProvider, IdentityProvider, SessionVerifier};
use portcullis_membership::{HttpMembershipStore, MembershipResolver, MembershipStore};
use portcullis_middleware::{
    BoxFuture, GateMiddleware, MiddlewareContext, Pipeline, Request, RequestIdMiddleware,
    Response, ResponseExt, TelemetryMiddleware,
};
use reqwest::Client;
use tracing::warn;

use crate::cron::{SchedulerTrigger, CRON_PATH};
use crate::error::ServerError;
use crate::health::{HealthCheck, ReadinessCheck};
use crate::workflows::{workflow_id, WorkflowEndpoint};

/// Everything a request needs, built once at startup and shared by every
/// connection.
#[derive(Debug)]
pub struct App {
    pipeline: Pipeline,
    workflows: WorkflowEndpoint,
    scheduler: Option<SchedulerTrigger>,
    health: HealthCheck,
    readiness: ReadinessCheck,
    request_timeout: Duration,
}

impl App {
    /// Builds the app with HTTP collaborators sharing one client.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Client` if the HTTP client cannot be built.
    pub fn from_config(config: &PortcullisConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .user_agent(concat!("portcullis/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut provider = HttpIdentityProvider::new(client.clone(), &config.identity.base_url);
        if let Some(api_key) = &config.identity.api_key {
            provider = provider.with_api_key(api_key);
        }
        let store = HttpMembershipStore::new(
            client.clone(),
            &config.membership.base_url,
            &config.membership.api_key,
        );

        Ok(Self::with_collaborators(
            config,
            Arc::new(provider),
            Arc::new(store),
            client,
        ))
    }

    /// Builds the app over the given collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: &PortcullisConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn MembershipStore>,
        client: Client,
    ) -> Self {
        let verifier = SessionVerifier::new(provider).with_timeout(config.identity.timeout());
        let resolver = MembershipResolver::new(store).with_timeout(config.membership.timeout());

        let gate = GateMiddleware::new(verifier, resolver.clone())
            .with_classifier(config.routes.classifier())
            .with_locale(config.locale.resolver())
            .with_routing(RoutingStateMachine::new(
                config.routes.route_paths(),
                config.routes.sign_in(),
            ));
        let request_id = if config.server.trust_request_id {
            RequestIdMiddleware::trust_incoming()
        } else {
            RequestIdMiddleware::new()
        };

        Self {
            pipeline: Pipeline::gated(
                request_id,
                TelemetryMiddleware::new(&config.telemetry.service_name),
                gate,
            ),
            workflows: WorkflowEndpoint::new(resolver),
            scheduler: config
                .scheduler
                .enabled
                .then(|| SchedulerTrigger::new(client, &config.scheduler)),
            health: HealthCheck::new(&config.telemetry.service_name, env!("CARGO_PKG_VERSION")),
            readiness: ReadinessCheck::new(),
            request_timeout: config.server.request_timeout(),
        }
    }

    /// Readiness, flipped off while draining.
    #[must_use]
    pub const fn readiness(&self) -> &ReadinessCheck {
        &self.readiness
    }

    /// The gate pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Handles one request end to end.
    pub async fn handle(self: Arc<Self>, request: Request) -> Response {
        if request.method() == Method::GET {
            match request.uri().path() {
                "/health" => return Response::json(StatusCode::OK, &self.health.status()),
                "/ready" => {
                    let status = self.readiness.status();
                    let code = if status.ready {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    return Response::json(code, &status);
                }
                _ => {}
            }
        }

        let app = Arc::clone(&self);
        self.pipeline
            .process(MiddlewareContext::new(), request, move |ctx, request| {
                app.route(ctx, request)
            })
            .await
    }

    fn route(
        self: Arc<Self>,
        ctx: &mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'static, Response> {
        let path = request.uri().path().to_string();

        if path == CRON_PATH {
            let Some(trigger) = self.scheduler.clone() else {
                return ready(not_found());
            };
            if !matches!(*request.method(), Method::GET | Method::POST) {
                return ready(method_not_allowed());
            }
            return bounded(self.request_timeout, async move {
                trigger.trigger(request.headers()).await
            });
        }

        if let Some(id) = workflow_id(&path) {
            if request.method() != Method::DELETE {
                return ready(method_not_allowed());
            }
            let endpoint = self.workflows.clone();
            let user = ctx.user().cloned();
            let request_id = ctx.request_id();
            let id = id.to_string();
            let query = request.uri().query().map(str::to_string);
            return bounded(self.request_timeout, async move {
                endpoint
                    .delete(user, request_id, &id, query.as_deref())
                    .await
            });
        }

        // stand-in for the rendering layer
        let body = serde_json::json!({
            "path": path,
            "locale": ctx.locale().map(|l| l.as_str().to_string()),
            "user": ctx.user().map(|u| u.id.clone()),
        });
        ready(Response::json(StatusCode::OK, &body))
    }
}

/// Bounds the handler only. The gate's cookies are applied to whatever this
/// returns, the 504 included.
fn bounded<F>(timeout: Duration, handler: F) -> BoxFuture<'static, Response>
where
    F: Future<Output = Response> + Send + 'static,
{
    Box::pin(async move {
        match tokio::time::timeout(timeout, handler).await {
            Ok(response) => response,
            Err(_) => {
                warn!(?timeout, "handler timed out");
                Response::json_error(
                    StatusCode::GATEWAY_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "request timed out",
                )
            }
        }
    })
}

fn ready(response: Response) -> BoxFuture<'static, Response> {
    Box::pin(std::future::ready(response))
}

fn not_found() -> Response {
    Response::json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "no such route")
}

fn method_not_allowed() -> Response {
    Response::json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        "method not allowed",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::{COOKIE, LOCATION, SET_COOKIE};
    use http_body_util::{BodyExt, Full};
    use portcullis_identity::InMemoryIdentityProvider;
    use portcullis_membership::InMemoryMembershipStore;

    fn app(config: &PortcullisConfig) -> Arc<App> {
        let provider = InMemoryIdentityProvider::new();
        provider.insert_session("tok", portcullis_core::fixtures::user());
        Arc::new(App::with_collaborators(
            config,
            Arc::new(provider),
            Arc::new(InMemoryMembershipStore::new()),
            Client::new(),
        ))
    }

    fn request(method: Method, uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    async fn json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_pipeline_order() {
        let app = app(&PortcullisConfig::default());
        assert_eq!(app.pipeline().stage_names(), ["request_id", "telemetry", "gate"]);
    }

    #[tokio::test]
    async fn test_health_bypasses_gate() {
        let app = app(&PortcullisConfig::default());
        let response = app.handle(request(Method::GET, "/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_reports_drain() {
        let app = app(&PortcullisConfig::default());
        app.readiness().set_ready(false);

        let response = Arc::clone(&app).handle(request(Method::GET, "/ready", None)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_anonymous_protected_path_redirects() {
        let app = app(&PortcullisConfig::default());
        let response = app.handle(request(Method::GET, "/app", None)).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/?next=%2Fapp");
    }

    #[tokio::test]
    async fn test_internal_queue_path_is_not_public() {
        let app = app(&PortcullisConfig::default());
        let response = app
            .handle(request(Method::POST, "/api/internal/process-queue", None))
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[LOCATION],
            "/?next=%2Fapi%2Finternal%2Fprocess-queue"
        );
    }

    #[tokio::test]
    async fn test_passthrough_reaches_application_handler() {
        let app = app(&PortcullisConfig::default());
        let response = app
            .handle(request(
                Method::GET,
                "/settings",
                Some("portcullis-session=tok; locale=es"),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["path"], "/settings");
        assert_eq!(body["locale"], "es");
        assert_eq!(body["user"], "user-1");
    }

    #[tokio::test]
    async fn test_disabled_scheduler_is_not_found() {
        let mut config = PortcullisConfig::default();
        config.scheduler.enabled = false;

        let response = app(&config)
            .handle(request(Method::GET, CRON_PATH, None))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_workflow_route_requires_delete() {
        let app = app(&PortcullisConfig::default());
        let response = app
            .handle(request(
                Method::GET,
                "/api/workflows/wf-1?workspace_id=ws-1",
                Some("portcullis-session=tok"),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    fn rotating_app(config: &PortcullisConfig, store: InMemoryMembershipStore) -> Arc<App> {
        let provider = InMemoryIdentityProvider::new();
        provider.insert_session("tok", portcullis_core::fixtures::user());
        provider.rotate_on_use("tok", "tok-2");
        Arc::new(App::with_collaborators(
            config,
            Arc::new(provider),
            Arc::new(store),
            Client::new(),
        ))
    }

    fn rotated_cookie(response: &Response) -> bool {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .any(|v| v.to_str().is_ok_and(|v| v.starts_with("portcullis-session=tok-2")))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_membership_keeps_rotated_session() {
        let mut config = PortcullisConfig::default();
        config.server.request_timeout_ms = 50;
        config.membership.timeout_ms = 100;

        let store = InMemoryMembershipStore::new();
        store.set_delay(Some(Duration::from_secs(2)));
        let app = rotating_app(&config, store);

        let response = app
            .handle(request(Method::GET, "/app", Some("portcullis-session=tok")))
            .await;

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/app/onboarding");
        assert!(rotated_cookie(&response));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_times_out_with_gate_cookies() {
        let mut config = PortcullisConfig::default();
        config.server.request_timeout_ms = 50;

        let store = InMemoryMembershipStore::new();
        store.set_delay(Some(Duration::from_secs(2)));
        let app = rotating_app(&config, store);

        let response = app
            .handle(request(
                Method::DELETE,
                "/api/workflows/wf-1?workspace_id=ws-1",
                Some("portcullis-session=tok"),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(rotated_cookie(&response));
    }
}
