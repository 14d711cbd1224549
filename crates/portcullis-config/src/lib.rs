//! Typed configuration for the Portcullis gate.
//!
//! Configuration is layered: built-in defaults, then an optional TOML or JSON
//! file, then `PORTCULLIS__SECTION__KEY` environment variables. Unknown
//! fields are rejected and the result is validated before use.
//!
//! The sections map onto the gate's collaborators:
//!
//! - [`ServerConfig`] - listen address, timeouts, request ID trust
//! - [`TelemetryConfigSection`] - logging and Prometheus metrics
//! - [`LocaleConfig`] - supported locales and the persistence cookie
//! - [`RoutesConfig`] - public, asset and workspace paths
//! - [`IdentityConfig`] / [`MembershipConfig`] - upstream services
//! - [`SchedulerConfig`] - scheduled trigger forwarding
//!
//! # Example
//!
//! ```no_run
//! use portcullis_config::ConfigLoader;
//!
//! # fn main() -> Result<(), portcullis_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("portcullis.toml")?
//!     .with_env_prefix("PORTCULLIS")
//!     .load()?;
//!
//! let classifier = config.routes.classifier();
//! let locales = config.locale.resolver();
//! # let _ = (classifier, locales);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [locale]
//! supported = ["en", "es"]
//! default = "en"
//!
//! [routes]
//! public_prefixes = ["/auth", "/api/cron/", "/legal/"]
//! landing = "/app/inbox"
//!
//! [identity]
//! base_url = "https://project.example.co/auth/v1"
//!
//! [membership]
//! base_url = "https://project.example.co/rest/v1"
//! api_key = "..."
//!
//! [scheduler]
//! secret = "..."
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
