//! Scheduled trigger for the internal queue processor.
//!
//! The external scheduler calls `/api/cron/process-queue`. The call is
//! accepted when it carries the scheduler's marker header or a bearer token
//! equal to the shared secret, and is then forwarded as a `POST` to the
//! internal queue endpoint with the secret attached. The upstream status and
//! JSON body are relayed back to the scheduler.

use std::time::Duration;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use metrics::counter;
use portcullis_config::SchedulerConfig;
use portcullis_core::{bearer_token, secrets_match};
use portcullis_middleware::{Response, ResponseExt};
use portcullis_telemetry::SCHEDULED_FORWARDS_TOTAL;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Path the scheduler calls.
pub const CRON_PATH: &str = "/api/cron/process-queue";

/// Internal queue endpoint the trigger forwards to.
pub const PROCESS_QUEUE_PATH: &str = "/api/internal/process-queue";

/// Authenticates scheduler calls and forwards them to the queue processor.
#[derive(Debug, Clone)]
pub struct SchedulerTrigger {
    client: Client,
    cron_header: String,
    cron_header_value: String,
    secret: Option<String>,
    target: String,
    timeout: Duration,
}

impl SchedulerTrigger {
    /// Creates a trigger forwarding through `client`.
    #[must_use]
    pub fn new(client: Client, config: &SchedulerConfig) -> Self {
        Self {
            client,
            cron_header: config.cron_header.to_ascii_lowercase(),
            cron_header_value: config.cron_header_value.clone(),
            secret: config.secret.clone(),
            target: format!(
                "{}{PROCESS_QUEUE_PATH}",
                config.internal_base_url.trim_end_matches('/')
            ),
            timeout: config.forward_timeout(),
        }
    }

    /// The URL calls are forwarded to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the inbound headers identify the scheduler.
    #[must_use]
    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let marked = headers
            .get(self.cron_header.as_str())
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == self.cron_header_value);
        if marked {
            return true;
        }

        match (self.secret.as_deref(), bearer_token(headers)) {
            (Some(secret), Some(token)) => secrets_match(token, secret),
            _ => false,
        }
    }

    /// Authenticates and forwards one scheduler call.
    pub async fn trigger(&self, headers: &HeaderMap) -> Response {
        if !self.is_authorized(headers) {
            counter!(SCHEDULED_FORWARDS_TOTAL, "outcome" => "unauthorized").increment(1);
            debug!("scheduler call rejected");
            return Response::json_error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "scheduler credentials required",
            );
        }

        let mut request = self
            .client
            .post(&self.target)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }

        let upstream = match request.send().await {
            Ok(upstream) => upstream,
            Err(e) => return self.upstream_failure(&e),
        };

        let status = upstream.status();
        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => return self.upstream_failure(&e),
        };

        let outcome = if status.is_success() { "forwarded" } else { "upstream_status" };
        counter!(SCHEDULED_FORWARDS_TOTAL, "outcome" => outcome).increment(1);
        info!(status = status.as_u16(), target = %self.target, "scheduled queue run forwarded");

        let value = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| {
            serde_json::json!({ "message": String::from_utf8_lossy(&body) })
        });
        Response::json(status, &value)
    }

    fn upstream_failure(&self, error: &reqwest::Error) -> Response {
        counter!(SCHEDULED_FORWARDS_TOTAL, "outcome" => "upstream_error").increment(1);
        warn!(error = %error, target = %self.target, timeout = error.is_timeout(), "queue processor unreachable");
        Response::json_error(
            StatusCode::BAD_GATEWAY,
            "UPSTREAM_UNAVAILABLE",
            "queue processor unavailable",
        )
    }
}
