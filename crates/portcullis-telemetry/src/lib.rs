//! Observability for Portcullis.
//!
//! - **Logging**: structured JSON (or pretty) logs via `tracing-subscriber`
//! - **Metrics**: Prometheus exposition via `metrics-exporter-prometheus`
//!
//! The gate pipeline emits through the `tracing` and `metrics` facades; this
//! crate only installs the global subscriber and recorder behind them.
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TelemetryConfig::builder()
//!         .service_name("portcullis")
//!         .metrics_addr("0.0.0.0:9090")
//!         .build();
//!
//!     init_telemetry(&config)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, MetricsConfig, SCHEDULED_FORWARDS_TOTAL};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging, then metrics.
///
/// Must be called once, from within a Tokio runtime when metrics are enabled.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to install.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        metrics = config.metrics.enabled,
        "telemetry initialized"
    );
    Ok(())
}
