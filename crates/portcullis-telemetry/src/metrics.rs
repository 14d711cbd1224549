//! Prometheus metrics.
//!
//! Installs the global `metrics` recorder with an HTTP listener serving the
//! Prometheus text format, and describes every metric the gate emits.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `portcullis_request_duration_seconds` | Histogram | `decision`, `status` |
//! | `portcullis_gate_decisions_total` | Counter | `decision`, `reason` |
//! | `portcullis_provider_failures_total` | Counter | - |
//! | `portcullis_membership_failures_total` | Counter | - |
//! | `portcullis_scheduled_forwards_total` | Counter | `outcome` |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use portcullis_middleware::stages::gate::{
    GATE_DECISIONS_TOTAL, MEMBERSHIP_FAILURES_TOTAL, PROVIDER_FAILURES_TOTAL,
};
use portcullis_middleware::stages::telemetry::REQUEST_DURATION_SECONDS;
use std::net::SocketAddr;

/// Counter of scheduled trigger forwards, labelled by `outcome`.
pub const SCHEDULED_FORWARDS_TOTAL: &str = "portcullis_scheduled_forwards_total";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for request duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparseable listen address
/// and `TelemetryError::MetricsInit` if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    prometheus_builder(config)?
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    describe_metrics();
    tracing::info!(%addr, "prometheus exporter listening");

    Ok(())
}

fn prometheus_builder(config: &MetricsConfig) -> TelemetryResult<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Registers descriptions for every gate metric.
pub fn describe_metrics() {
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "End-to-end request duration, including gate redirects"
    );
    describe_counter!(
        GATE_DECISIONS_TOTAL,
        "Gate decisions by kind and reason"
    );
    describe_counter!(
        PROVIDER_FAILURES_TOTAL,
        "Identity provider errors and timeouts, treated as anonymous"
    );
    describe_counter!(
        MEMBERSHIP_FAILURES_TOTAL,
        "Membership query errors and timeouts, treated as no workspace"
    );
    describe_counter!(
        SCHEDULED_FORWARDS_TOTAL,
        "Scheduled trigger forwards by outcome"
    );
}
