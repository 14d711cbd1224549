//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, LogFormat, PortcullisConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use portcullis_config::ConfigLoader;
///
/// # fn main() -> Result<(), portcullis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("portcullis.toml")?
///     .with_env_prefix("PORTCULLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: PortcullisConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PortcullisConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = PortcullisConfig::default();
        self
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PortcullisConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = PortcullisConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use portcullis_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [routes]
    ///     landing = "/app/home"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.routes.landing, "/app/home");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `PORTCULLIS__SERVER__HTTP_ADDR=0.0.0.0:9000`. List values are comma
    /// separated.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // missing .env is fine
        let _ = dotenvy::dotenv();
        self
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not parse or validation fails.
    pub fn load(mut self) -> Result<PortcullisConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> PortcullisConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<PortcullisConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            // Server section
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                config.server.shutdown_timeout_secs = parse_u64(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                config.server.request_timeout_ms = parse_u64(key, value)?;
            }
            ["SERVER", "KEEP_ALIVE_SECS"] => {
                config.server.keep_alive_secs = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        ConfigError::env_parse_error(key, "expected integer or 'none'")
                    })?)
                };
            }
            ["SERVER", "TRUST_REQUEST_ID"] => {
                config.server.trust_request_id = parse_bool_var(key, value)?;
            }

            // Telemetry section
            ["TELEMETRY", "SERVICE_NAME"] => config.telemetry.service_name = value.to_string(),
            ["TELEMETRY", "ENVIRONMENT"] => config.telemetry.environment = value.to_string(),
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => config.telemetry.metrics.addr = value.to_string(),
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool_var(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => config.telemetry.logging.level = value.to_string(),
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "ANSI_ENABLED"] => {
                config.telemetry.logging.ansi_enabled = parse_bool_var(key, value)?;
            }

            // Locale section
            ["LOCALE", "SUPPORTED"] => config.locale.supported = parse_list(value),
            ["LOCALE", "DEFAULT"] => config.locale.default = value.to_string(),
            ["LOCALE", "COOKIE_NAME"] => config.locale.cookie_name = value.to_string(),
            ["LOCALE", "MAX_AGE_SECS"] => config.locale.max_age_secs = parse_u64(key, value)?,

            // Routes section
            ["ROUTES", "SIGN_IN_PATH"] => config.routes.sign_in_path = value.to_string(),
            ["ROUTES", "CONTINUATION_PARAM"] => {
                config.routes.continuation_param = value.to_string();
            }
            ["ROUTES", "PUBLIC_PATHS"] => config.routes.public_paths = parse_list(value),
            ["ROUTES", "PUBLIC_PREFIXES"] => config.routes.public_prefixes = parse_list(value),
            ["ROUTES", "ASSET_PREFIXES"] => config.routes.asset_prefixes = parse_list(value),
            ["ROUTES", "ASSET_EXTENSIONS"] => config.routes.asset_extensions = parse_list(value),
            ["ROUTES", "WORKSPACE_ROOT"] => config.routes.workspace_root = value.to_string(),
            ["ROUTES", "ONBOARDING"] => config.routes.onboarding = value.to_string(),
            ["ROUTES", "LANDING"] => config.routes.landing = value.to_string(),

            // Collaborators
            ["IDENTITY", "BASE_URL"] => config.identity.base_url = value.to_string(),
            ["IDENTITY", "API_KEY"] => config.identity.api_key = non_empty(value),
            ["IDENTITY", "TIMEOUT_MS"] => config.identity.timeout_ms = parse_u64(key, value)?,
            ["MEMBERSHIP", "BASE_URL"] => config.membership.base_url = value.to_string(),
            ["MEMBERSHIP", "API_KEY"] => config.membership.api_key = value.to_string(),
            ["MEMBERSHIP", "TIMEOUT_MS"] => config.membership.timeout_ms = parse_u64(key, value)?,

            // Scheduler section
            ["SCHEDULER", "ENABLED"] => config.scheduler.enabled = parse_bool_var(key, value)?,
            ["SCHEDULER", "CRON_HEADER"] => config.scheduler.cron_header = value.to_string(),
            ["SCHEDULER", "SECRET"] => config.scheduler.secret = non_empty(value),
            ["SCHEDULER", "INTERNAL_BASE_URL"] => {
                config.scheduler.internal_base_url = value.to_string();
            }
            ["SCHEDULER", "FORWARD_TIMEOUT_MS"] => {
                config.scheduler.forward_timeout_ms = parse_u64(key, value)?;
            }

            // Unknown keys are ignored.
            _ => {}
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_with_development() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_production() {
        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"locale": {"supported": ["en", "de"], "default": "de"}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.locale.default, "de");
        assert_eq!(config.locale.cookie_name, "locale");
    }

    #[test]
    fn test_loader_rejects_unknown_format() {
        assert!(ConfigLoader::new().with_string("", "yaml").is_err());
    }

    #[test]
    fn test_loader_validates_on_load() {
        let toml = r#"
            [locale]
            default = "fr"
        "#;

        let result = ConfigLoader::new().with_string(toml, "toml").unwrap().load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_loader_with_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            http_addr = "127.0.0.1:4000"

            [scheduler]
            secret = "cron-secret"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:4000");
        assert_eq!(config.scheduler.secret.as_deref(), Some("cron-secret"));
    }

    #[test]
    fn test_loader_with_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/portcullis.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let config = ConfigLoader::new()
            .with_optional_file("/nonexistent/portcullis.toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config, PortcullisConfig::default());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("en, es ,pt"), vec!["en", "es", "pt"]);
        assert!(parse_list(" , ").is_empty());
    }

    // Process environment is not mutated in tests; overrides go through
    // apply_env_var directly.

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SERVER__HTTP_ADDR", "192.168.1.1:9000", "TEST").unwrap();
        loader.apply_env_var("TEST__SERVER__KEEP_ALIVE_SECS", "none", "TEST").unwrap();
        loader.apply_env_var("TEST__SERVER__TRUST_REQUEST_ID", "yes", "TEST").unwrap();
        assert_eq!(loader.config.server.http_addr, "192.168.1.1:9000");
        assert_eq!(loader.config.server.keep_alive_secs, None);
        assert!(loader.config.server.trust_request_id);
    }

    #[test]
    fn test_apply_env_var_locale_list() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__LOCALE__SUPPORTED", "en,es,pt", "TEST").unwrap();
        loader.apply_env_var("TEST__LOCALE__DEFAULT", "pt", "TEST").unwrap();
        assert_eq!(loader.config.locale.supported, vec!["en", "es", "pt"]);
        assert_eq!(loader.config.locale.default, "pt");
    }

    #[test]
    fn test_apply_env_var_routes() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__ROUTES__PUBLIC_PREFIXES", "/auth,/pricing", "TEST")
            .unwrap();
        loader.apply_env_var("TEST__ROUTES__LANDING", "/app/home", "TEST").unwrap();
        assert_eq!(loader.config.routes.public_prefixes, vec!["/auth", "/pricing"]);
        assert_eq!(loader.config.routes.landing, "/app/home");
    }

    #[test]
    fn test_apply_env_var_secrets() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__SCHEDULER__SECRET", "abc", "TEST").unwrap();
        loader.apply_env_var("TEST__IDENTITY__API_KEY", "", "TEST").unwrap();
        assert_eq!(loader.config.scheduler.secret.as_deref(), Some("abc"));
        assert_eq!(loader.config.identity.api_key, None);
    }

    #[test]
    fn test_apply_env_var_invalid_integer() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env_var("TEST__IDENTITY__TIMEOUT_MS", "soon", "TEST");
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_apply_env_var_log_format() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "pretty", "TEST").unwrap();
        assert_eq!(loader.config.telemetry.logging.format, LogFormat::Pretty);
        assert!(loader.apply_env_var("TEST__TELEMETRY__LOGGING__FORMAT", "xml", "TEST").is_err());
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader.apply_env_var("TEST__NOPE__NOTHING", "1", "TEST").unwrap();
        assert_eq!(loader.config, PortcullisConfig::default());
    }

    #[test]
    fn test_complete_toml_config() {
        let toml = r#"
            [server]
            http_addr = "0.0.0.0:8080"
            shutdown_timeout_secs = 10
            trust_request_id = true

            [telemetry]
            service_name = "gate"
            environment = "staging"

            [telemetry.logging]
            level = "portcullis=debug,info"
            format = "json"

            [locale]
            supported = ["en", "es"]
            default = "es"

            [routes]
            public_prefixes = ["/auth", "/api/cron/", "/api/internal/", "/legal/"]
            landing = "/app/inbox"

            [identity]
            base_url = "https://project.example.co/auth/v1"
            api_key = "anon"
            timeout_ms = 3000

            [membership]
            base_url = "https://project.example.co/rest/v1"
            api_key = "anon"

            [scheduler]
            secret = "cron"
            internal_base_url = "https://app.example.com"
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.shutdown_timeout_secs, 10);
        assert_eq!(config.telemetry.logging.level, "portcullis=debug,info");
        assert_eq!(config.locale.resolver().default_locale().as_str(), "es");
        assert_eq!(config.identity.timeout_ms, 3000);
        assert_eq!(config.membership.timeout_ms, 5000);
        assert_eq!(config.routes.public_prefixes.len(), 4);
    }
}
