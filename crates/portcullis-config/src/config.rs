//! Main configuration types.
//!
//! This module provides the top-level [`PortcullisConfig`] struct and its builder.

use std::net::SocketAddr;

use portcullis_core::PathClass;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, IdentityConfig, LocaleConfig, MembershipConfig, RoutesConfig, SchedulerConfig,
    ServerConfig, TelemetryConfigSection,
};

/// Complete Portcullis configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use portcullis_config::PortcullisConfig;
///
/// let config = PortcullisConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.routes.onboarding, "/app/onboarding");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PortcullisConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telemetry configuration (metrics, logging).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,

    /// Supported locales and the persistence cookie.
    #[serde(default)]
    pub locale: LocaleConfig,

    /// Path classes and redirect targets.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Identity provider.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Membership store.
    #[serde(default)]
    pub membership: MembershipConfig,

    /// Scheduled trigger forwarding.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl PortcullisConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::{PortcullisConfig, ServerConfig};
    ///
    /// let config = PortcullisConfig::builder()
    ///     .server(ServerConfig {
    ///         http_addr: "127.0.0.1:3000".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    #[must_use]
    pub fn builder() -> PortcullisConfigBuilder {
        PortcullisConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - A listen address does not parse
    /// - The default locale is not among the supported ones
    /// - A route does not start with `/`
    /// - The sign-in, onboarding or landing paths would redirect into
    ///   themselves
    /// - A collaborator timeout is zero, or together they exceed the
    ///   request timeout
    /// - A collaborator URL is not http(s)
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_socket_addr("server.http_addr", &self.server.http_addr)?;

        if self.telemetry.metrics.enabled {
            check_socket_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.locale.supported.is_empty() {
            return Err(ConfigError::invalid_value(
                "locale.supported",
                "at least one locale is required",
            ));
        }
        if !self.locale.supported.contains(&self.locale.default) {
            return Err(ConfigError::invalid_value(
                "locale.default",
                format!("'{}' is not a supported locale", self.locale.default),
            ));
        }
        if self.locale.cookie_name.is_empty() {
            return Err(ConfigError::invalid_value("locale.cookie_name", "must not be empty"));
        }

        let routes = &self.routes;
        for (field, path) in [
            ("routes.sign_in_path", &routes.sign_in_path),
            ("routes.workspace_root", &routes.workspace_root),
            ("routes.onboarding", &routes.onboarding),
            ("routes.landing", &routes.landing),
            ("routes.favicon_path", &routes.favicon_path),
            ("routes.brand_prefix", &routes.brand_prefix),
        ] {
            check_route(field, path)?;
        }
        for path in routes.public_paths.iter().chain(&routes.public_prefixes) {
            check_route("routes.public_paths", path)?;
        }
        for path in &routes.asset_prefixes {
            check_route("routes.asset_prefixes", path)?;
        }
        if routes.continuation_param.is_empty() {
            return Err(ConfigError::invalid_value(
                "routes.continuation_param",
                "must not be empty",
            ));
        }
        check_redirect_targets(routes)?;

        check_url("identity.base_url", &self.identity.base_url)?;
        check_timeout("identity.timeout_ms", self.identity.timeout_ms)?;
        check_url("membership.base_url", &self.membership.base_url)?;
        check_timeout("membership.timeout_ms", self.membership.timeout_ms)?;

        let gate_budget = self.identity.timeout_ms.saturating_add(self.membership.timeout_ms);
        if self.server.request_timeout_ms <= gate_budget {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                format!(
                    "must exceed identity.timeout_ms + membership.timeout_ms ({gate_budget} ms)"
                ),
            ));
        }

        if self.scheduler.enabled {
            check_url("scheduler.internal_base_url", &self.scheduler.internal_base_url)?;
            check_timeout("scheduler.forward_timeout_ms", self.scheduler.forward_timeout_ms)?;
            if self.scheduler.secret.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::invalid_value(
                    "scheduler.secret",
                    "must not be empty when set",
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty, colored debug logs with source locations, and incoming
    /// request IDs are trusted.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::PortcullisConfig;
    ///
    /// let config = PortcullisConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = crate::LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.logging.include_location = true;
        config.telemetry.environment = "development".to_string();

        config.server.trust_request_id = true;

        config
    }

    /// Create a production configuration preset.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::PortcullisConfig;
    ///
    /// let config = PortcullisConfig::production();
    /// assert_eq!(config.telemetry.logging.format, portcullis_config::LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = crate::LogFormat::Json;
        config.telemetry.logging.ansi_enabled = false;
        config.telemetry.environment = "production".to_string();

        config.server.trust_request_id = false;

        config
    }
}

fn check_socket_addr(field: &str, addr: &str) -> Result<(), ConfigError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {addr}")))
}

fn check_route(field: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, format!("'{path}' must start with '/'")))
    }
}

/// Every redirect target must be a passthrough for the state that is sent
/// there.
fn check_redirect_targets(routes: &RoutesConfig) -> Result<(), ConfigError> {
    if routes.classifier().classify(&routes.sign_in_path) != PathClass::Public {
        return Err(ConfigError::invalid_value(
            "routes.sign_in_path",
            format!("'{}' must be a public path", routes.sign_in_path),
        ));
    }

    let paths = routes.route_paths();
    if !paths.is_workspace_scoped(&paths.onboarding) || paths.is_workspace_root(&paths.onboarding) {
        return Err(ConfigError::invalid_value(
            "routes.onboarding",
            format!(
                "'{}' must lie beneath routes.workspace_root '{}'",
                paths.onboarding, paths.workspace_root
            ),
        ));
    }
    if paths.is_onboarding(&paths.landing) || paths.is_workspace_root(&paths.landing) {
        return Err(ConfigError::invalid_value(
            "routes.landing",
            format!(
                "'{}' must be outside onboarding and the workspace root",
                paths.landing
            ),
        ));
    }
    Ok(())
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::invalid_value(field, format!("'{url}' is not an http(s) URL")))
    }
}

fn check_timeout(field: &str, millis: u64) -> Result<(), ConfigError> {
    if millis == 0 {
        Err(ConfigError::invalid_value(field, "must be greater than zero"))
    } else {
        Ok(())
    }
}

/// Builder for [`PortcullisConfig`].
#[derive(Debug, Default)]
pub struct PortcullisConfigBuilder {
    server: Option<ServerConfig>,
    telemetry: Option<TelemetryConfigSection>,
    locale: Option<LocaleConfig>,
    routes: Option<RoutesConfig>,
    identity: Option<IdentityConfig>,
    membership: Option<MembershipConfig>,
    scheduler: Option<SchedulerConfig>,
}

impl PortcullisConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server configuration.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the locale configuration.
    #[must_use]
    pub fn locale(mut self, locale: LocaleConfig) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Set the routes configuration.
    #[must_use]
    pub fn routes(mut self, routes: RoutesConfig) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Set the identity provider configuration.
    #[must_use]
    pub fn identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the membership store configuration.
    #[must_use]
    pub fn membership(mut self, membership: MembershipConfig) -> Self {
        self.membership = Some(membership);
        self
    }

    /// Set the scheduler configuration.
    #[must_use]
    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> PortcullisConfig {
        PortcullisConfig {
            server: self.server.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
            locale: self.locale.unwrap_or_default(),
            routes: self.routes.unwrap_or_default(),
            identity: self.identity.unwrap_or_default(),
            membership: self.membership.unwrap_or_default(),
            scheduler: self.scheduler.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<PortcullisConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
