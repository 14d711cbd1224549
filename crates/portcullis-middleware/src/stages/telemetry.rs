//! Telemetry emission middleware.
//!
//! Wraps the gate and the handler, so every request is measured, including
//! the ones the gate answers with a redirect.
//!
//! # Metrics Emitted
//!
//! - `portcullis_request_duration_seconds` - histogram by decision and status
//!
//! The gate itself counts decisions and collaborator failures; see
//! [`GateMiddleware`](super::GateMiddleware).
//!
//! # Log Fields
//!
//! `request_id`, `method`, `path`, `status`, `decision`, `duration_ms`.

use crate::{
    context::MiddlewareContext,
    middleware::{BoxFuture, Middleware, Next},
    types::{Request, Response},
};
use portcullis_core::RoutingDecision;
use std::time::Instant;
use tracing::{debug, info};

/// Histogram of end-to-end request latency.
pub const REQUEST_DURATION_SECONDS: &str = "portcullis_request_duration_seconds";

/// Telemetry middleware that emits metrics and logs for every request.
#[derive(Debug, Clone)]
pub struct TelemetryMiddleware {
    service_name: String,
    verbose: bool,
}

/// What was observed about a finished request.
///
/// Left in the context as an extension for the handler's caller to inspect.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    /// The service name.
    pub service_name: String,
    /// The HTTP method.
    pub method: String,
    /// The request path.
    pub path: String,
    /// The HTTP status code.
    pub status_code: u16,
    /// `passthrough`, `redirect`, or `none` when the gate never ran.
    pub decision: &'static str,
    /// Request duration in milliseconds.
    pub duration_ms: f64,
    /// The request ID.
    pub request_id: String,
}

impl TelemetryMiddleware {
    /// Creates a new telemetry middleware with the given service name.
    #[must_use]
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            verbose: false,
        }
    }

    /// Logs every request at `info` instead of `debug`.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The configured service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn emit(&self, summary: &RequestSummary) {
        metrics::histogram!(
            REQUEST_DURATION_SECONDS,
            "decision" => summary.decision,
            "status" => summary.status_code.to_string()
        )
        .record(summary.duration_ms / 1000.0);

        if self.verbose {
            info!(
                service = %summary.service_name,
                request_id = %summary.request_id,
                method = %summary.method,
                path = %summary.path,
                status = summary.status_code,
                decision = summary.decision,
                duration_ms = summary.duration_ms,
                "request completed"
            );
        } else {
            debug!(
                request_id = %summary.request_id,
                method = %summary.method,
                path = %summary.path,
                status = summary.status_code,
                decision = summary.decision,
                duration_ms = summary.duration_ms,
                "request completed"
            );
        }
    }
}

impl Middleware for TelemetryMiddleware {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let method = request.method().to_string();
            let path = request.uri().path().to_string();

            let response = next.run(ctx, request).await;

            let summary = RequestSummary {
                service_name: self.service_name.clone(),
                method,
                path,
                status_code: response.status().as_u16(),
                decision: ctx.decision().map_or("none", RoutingDecision::kind),
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                request_id: ctx.request_id().to_string(),
            };
            self.emit(&summary);
            ctx.set_extension(summary);

            response
        })
    }
}
