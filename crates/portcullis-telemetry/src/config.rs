//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;
use portcullis_config::{LogFormat, TelemetryConfigSection};

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Service name (used in logs).
    pub service_name: String,

    /// Environment (production, staging, development).
    pub environment: String,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// Logging configuration.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "portcullis".to_string(),
            environment: "development".to_string(),
            metrics: MetricsConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl From<&TelemetryConfigSection> for TelemetryConfig {
    fn from(section: &TelemetryConfigSection) -> Self {
        let logging = &section.logging;

        Self::builder()
            .service_name(&section.service_name)
            .environment(&section.environment)
            .metrics(MetricsConfig {
                enabled: section.metrics.enabled,
                addr: section.metrics.addr.clone(),
                duration_buckets: section.metrics.histogram_buckets.clone(),
            })
            .logging(LogConfig {
                enabled: logging.enabled,
                level: logging.level.clone(),
                json_format: logging.format == LogFormat::Json,
                file_line_info: logging.include_location,
                ansi: logging.ansi_enabled,
                ..LogConfig::default()
            })
            .build()
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    service_name: Option<String>,
    environment: Option<String>,
    metrics: Option<MetricsConfig>,
    logging: Option<LogConfig>,
}

impl TelemetryConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        self.service_name = Some(name.to_string());
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn environment(mut self, env: &str) -> Self {
        self.environment = Some(env.to_string());
        self
    }

    /// Sets the metrics configuration.
    #[must_use]
    pub fn metrics(mut self, config: MetricsConfig) -> Self {
        self.metrics = Some(config);
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn logging(mut self, config: LogConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Sets the metrics endpoint address.
    #[must_use]
    pub fn metrics_addr(mut self, addr: &str) -> Self {
        let config = self.metrics.take().unwrap_or_default();
        self.metrics = Some(MetricsConfig {
            enabled: true,
            addr: addr.to_string(),
            ..config
        });
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let defaults = TelemetryConfig::default();

        let service_name = self.service_name.unwrap_or(defaults.service_name);
        let environment = self.environment.unwrap_or(defaults.environment);

        let mut logging = self.logging.unwrap_or(defaults.logging);
        logging.service_name.clone_from(&service_name);

        TelemetryConfig {
            service_name,
            environment,
            metrics: self.metrics.unwrap_or(defaults.metrics),
            logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "portcullis");
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_builder_propagates_service_name() {
        let config = TelemetryConfig::builder().service_name("gate-eu").build();
        assert_eq!(config.logging.service_name, "gate-eu");
    }

    #[test]
    fn test_builder_metrics_addr() {
        let config = TelemetryConfig::builder()
            .metrics_addr("127.0.0.1:9999")
            .build();

        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.addr, "127.0.0.1:9999");
    }

    #[test]
    fn test_from_config_section() {
        let mut section = TelemetryConfigSection::default();
        section.service_name = "gate".to_string();
        section.logging.format = LogFormat::Pretty;
        section.logging.level = "debug".to_string();
        section.logging.include_location = true;
        section.metrics.enabled = false;

        let config = TelemetryConfig::from(&section);

        assert_eq!(config.service_name, "gate");
        assert_eq!(config.logging.service_name, "gate");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_line_info);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.metrics.enabled);
    }
}
