//! Configuration schema types.
//!
//! Every section rejects unknown fields and defaults every field, so a file
//! only needs to name what it changes.

use std::time::Duration;

use portcullis_core::paths::DEFAULT_ASSET_EXTENSIONS;
use portcullis_core::{LocaleResolver, PathClassifier, RoutePaths, SignInRedirect};
use serde::{Deserialize, Serialize};

/// Server configuration section.
///
/// # Example
///
/// ```
/// use portcullis_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Per-request deadline in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Keep-alive timeout in seconds. None disables keep-alive.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: Option<u64>,

    /// Reuse a valid incoming `x-request-id` instead of generating one.
    #[serde(default)]
    pub trust_request_id: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            keep_alive_secs: default_keep_alive(),
            trust_request_id: false,
        }
    }
}

impl ServerConfig {
    /// The per-request deadline.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The graceful shutdown window.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30_000
}

#[allow(clippy::unnecessary_wraps)]
fn default_keep_alive() -> Option<u64> {
    Some(60)
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Enable metrics collection and the Prometheus listener.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus metrics endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,

    /// Histogram bucket boundaries for request duration.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_metrics_addr(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or full `EnvFilter` directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include ANSI color codes in output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            ansi_enabled: false,
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry section: service identity, metrics and logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name attached to logs.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment label.
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "portcullis".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Locale section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocaleConfig {
    /// Supported locale codes.
    #[serde(default = "default_locales")]
    pub supported: Vec<String>,

    /// Locale used when the cookie is missing or unsupported.
    #[serde(default = "default_locale")]
    pub default: String,

    /// Name of the persistence cookie.
    #[serde(default = "default_locale_cookie")]
    pub cookie_name: String,

    /// Max-Age of the persistence cookie.
    #[serde(default = "default_locale_max_age")]
    pub max_age_secs: u64,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            supported: default_locales(),
            default: default_locale(),
            cookie_name: default_locale_cookie(),
            max_age_secs: default_locale_max_age(),
        }
    }
}

impl LocaleConfig {
    /// Builds the resolver the gate uses.
    #[must_use]
    pub fn resolver(&self) -> LocaleResolver {
        LocaleResolver::new(self.supported.iter().cloned(), self.default.clone())
            .with_cookie_name(self.cookie_name.clone())
            .with_max_age_secs(self.max_age_secs)
    }
}

fn default_locales() -> Vec<String> {
    vec!["en".to_string(), "es".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_locale_cookie() -> String {
    portcullis_core::locale::DEFAULT_LOCALE_COOKIE.to_string()
}

fn default_locale_max_age() -> u64 {
    portcullis_core::locale::DEFAULT_LOCALE_MAX_AGE_SECS
}

/// Routes section: what is public, what is an asset, where redirects go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// Sign-in entry path.
    #[serde(default = "default_sign_in")]
    pub sign_in_path: String,

    /// Query parameter carrying the continuation target.
    #[serde(default = "default_continuation_param")]
    pub continuation_param: String,

    /// Exact paths reachable without a session.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Path prefixes reachable without a session.
    #[serde(default = "default_public_prefixes")]
    pub public_prefixes: Vec<String>,

    /// Static asset prefixes.
    #[serde(default = "default_asset_prefixes")]
    pub asset_prefixes: Vec<String>,

    /// Static asset file extensions, without the dot.
    #[serde(default = "default_asset_extensions")]
    pub asset_extensions: Vec<String>,

    /// Exact favicon path.
    #[serde(default = "default_favicon")]
    pub favicon_path: String,

    /// Public brand asset prefix.
    #[serde(default = "default_brand_prefix")]
    pub brand_prefix: String,

    /// Entry path of the workspace area.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// Onboarding path.
    #[serde(default = "default_onboarding")]
    pub onboarding: String,

    /// Landing view for onboarded users.
    #[serde(default = "default_landing")]
    pub landing: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            sign_in_path: default_sign_in(),
            continuation_param: default_continuation_param(),
            public_paths: default_public_paths(),
            public_prefixes: default_public_prefixes(),
            asset_prefixes: default_asset_prefixes(),
            asset_extensions: default_asset_extensions(),
            favicon_path: default_favicon(),
            brand_prefix: default_brand_prefix(),
            workspace_root: default_workspace_root(),
            onboarding: default_onboarding(),
            landing: default_landing(),
        }
    }
}

impl RoutesConfig {
    /// Builds the path classifier.
    #[must_use]
    pub fn classifier(&self) -> PathClassifier {
        PathClassifier::builder()
            .asset_prefixes(self.asset_prefixes.iter().cloned())
            .asset_extensions(self.asset_extensions.iter().cloned())
            .favicon_path(self.favicon_path.clone())
            .brand_prefix(self.brand_prefix.clone())
            .public_paths(self.public_paths.iter().cloned())
            .public_prefixes(self.public_prefixes.iter().cloned())
            .build()
    }

    /// The routing state machine's paths.
    #[must_use]
    pub fn route_paths(&self) -> RoutePaths {
        RoutePaths {
            workspace_root: self.workspace_root.clone(),
            onboarding: self.onboarding.clone(),
            landing: self.landing.clone(),
        }
    }

    /// The sign-in redirect constructor. Unsafe continuations fall back to
    /// the landing view.
    #[must_use]
    pub fn sign_in(&self) -> SignInRedirect {
        SignInRedirect::new(
            self.sign_in_path.clone(),
            self.continuation_param.clone(),
            self.landing.clone(),
        )
    }
}

fn default_sign_in() -> String {
    "/".to_string()
}

fn default_continuation_param() -> String {
    portcullis_core::redirect::DEFAULT_CONTINUATION_PARAM.to_string()
}

fn default_public_paths() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_public_prefixes() -> Vec<String> {
    vec!["/auth".to_string(), "/api/cron/".to_string()]
}

fn default_asset_prefixes() -> Vec<String> {
    vec!["/_static/".to_string(), "/_image/".to_string()]
}

fn default_asset_extensions() -> Vec<String> {
    DEFAULT_ASSET_EXTENSIONS.iter().map(|e| (*e).to_string()).collect()
}

fn default_favicon() -> String {
    "/favicon.ico".to_string()
}

fn default_brand_prefix() -> String {
    "/brand/".to_string()
}

fn default_workspace_root() -> String {
    "/app".to_string()
}

fn default_onboarding() -> String {
    "/app/onboarding".to_string()
}

fn default_landing() -> String {
    "/app/inbox".to_string()
}

/// Identity provider section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Base URL of the identity provider.
    #[serde(default = "default_identity_url")]
    pub base_url: String,

    /// Optional API key sent with every provider call.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bound on a session lookup, in milliseconds.
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_ms: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_url(),
            api_key: None,
            timeout_ms: default_collaborator_timeout(),
        }
    }
}

impl IdentityConfig {
    /// The session lookup bound.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_identity_url() -> String {
    "http://127.0.0.1:9999/auth/v1".to_string()
}

fn default_collaborator_timeout() -> u64 {
    5_000
}

/// Membership store section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MembershipConfig {
    /// Base URL of the PostgREST-style data API.
    #[serde(default = "default_membership_url")]
    pub base_url: String,

    /// Project API key sent as `apikey`.
    #[serde(default)]
    pub api_key: String,

    /// Bound on a membership query, in milliseconds.
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_ms: u64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            base_url: default_membership_url(),
            api_key: String::new(),
            timeout_ms: default_collaborator_timeout(),
        }
    }
}

impl MembershipConfig {
    /// The membership query bound.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_membership_url() -> String {
    "http://127.0.0.1:9999/rest/v1".to_string()
}

/// Scheduled trigger section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Serve the scheduled trigger endpoint.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Header set by the platform scheduler.
    #[serde(default = "default_cron_header")]
    pub cron_header: String,

    /// Value the scheduler header must carry.
    #[serde(default = "default_cron_header_value")]
    pub cron_header_value: String,

    /// Shared secret accepted as `Authorization: Bearer <secret>` and
    /// forwarded to the internal queue endpoint.
    #[serde(default)]
    pub secret: Option<String>,

    /// Base URL of the internal queue processor.
    #[serde(default = "default_internal_base")]
    pub internal_base_url: String,

    /// Bound on the forwarded call, in milliseconds.
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_header: default_cron_header(),
            cron_header_value: default_cron_header_value(),
            secret: None,
            internal_base_url: default_internal_base(),
            forward_timeout_ms: default_forward_timeout(),
        }
    }
}

impl SchedulerConfig {
    /// The forwarded call bound.
    #[must_use]
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

fn default_cron_header() -> String {
    "x-vercel-cron".to_string()
}

fn default_cron_header_value() -> String {
    "1".to_string()
}

fn default_internal_base() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_forward_timeout() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_core::PathClass;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(!config.trust_request_id);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("http_adr = \"0.0.0.0:1\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: LocaleConfig = toml::from_str("default = \"es\"").unwrap();
        assert_eq!(config.default, "es");
        assert_eq!(config.cookie_name, "locale");
        assert_eq!(config.max_age_secs, 31_536_000);
    }

    #[test]
    fn test_locale_resolver_conversion() {
        let config = LocaleConfig {
            supported: vec!["en".to_string(), "fr".to_string()],
            default: "fr".to_string(),
            cookie_name: "lang".to_string(),
            ..Default::default()
        };
        let resolver = config.resolver();
        assert_eq!(resolver.cookie_name(), "lang");
        assert_eq!(resolver.resolve(Some("de")).as_str(), "fr");
        assert_eq!(resolver.resolve(Some("en")).as_str(), "en");
    }

    #[test]
    fn test_default_routes_match_core_defaults() {
        let routes = RoutesConfig::default();
        assert_eq!(routes.classifier(), PathClassifier::default());
        assert_eq!(routes.route_paths(), RoutePaths::default());
        assert_eq!(routes.sign_in(), SignInRedirect::default());
    }

    #[test]
    fn test_custom_public_prefix() {
        let routes = RoutesConfig {
            public_prefixes: vec!["/auth".to_string(), "/pricing".to_string()],
            ..Default::default()
        };
        let classifier = routes.classifier();
        assert_eq!(classifier.classify("/pricing"), PathClass::Public);
        assert_eq!(classifier.classify("/api/cron/process-queue"), PathClass::Protected);
    }

    #[test]
    fn test_collaborator_timeouts() {
        assert_eq!(IdentityConfig::default().timeout(), Duration::from_secs(5));
        assert_eq!(MembershipConfig::default().timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.cron_header, "x-vercel-cron");
        assert_eq!(config.cron_header_value, "1");
        assert!(config.secret.is_none());
    }
}
