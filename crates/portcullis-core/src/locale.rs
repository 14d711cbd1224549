//! Locale resolution.
//!
//! The locale cookie is authoritative. There is no `Accept-Language`
//! negotiation: a missing or unsupported cookie resolves to the default.

use crate::cookie::{CookieJar, SameSite, SetCookie};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default locale cookie name.
pub const DEFAULT_LOCALE_COOKIE: &str = "locale";

/// Default locale cookie lifetime: one year.
pub const DEFAULT_LOCALE_MAX_AGE_SECS: u64 = 31_536_000;

/// A resolved locale code, always a member of the resolver's supported set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    /// Returns the locale code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the request locale and stamps the persistence cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleResolver {
    supported: Vec<String>,
    default: String,
    cookie_name: String,
    max_age_secs: u64,
}

impl Default for LocaleResolver {
    fn default() -> Self {
        Self::new(["en", "es"], "en")
    }
}

impl LocaleResolver {
    /// Creates a resolver. The default is added to the supported set when
    /// missing.
    #[must_use]
    pub fn new<I, S>(supported: I, default: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let default = default.into();
        let mut supported: Vec<String> = supported.into_iter().map(Into::into).collect();
        if !supported.contains(&default) {
            supported.push(default.clone());
        }
        Self {
            supported,
            default,
            cookie_name: DEFAULT_LOCALE_COOKIE.to_string(),
            max_age_secs: DEFAULT_LOCALE_MAX_AGE_SECS,
        }
    }

    /// Overrides the cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Overrides the cookie lifetime.
    #[must_use]
    pub fn with_max_age_secs(mut self, secs: u64) -> Self {
        self.max_age_secs = secs;
        self
    }

    /// Name of the locale cookie.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The default locale.
    #[must_use]
    pub fn default_locale(&self) -> Locale {
        Locale(self.default.clone())
    }

    /// Supported locale codes.
    #[must_use]
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    /// Returns `true` if `code` is in the supported set.
    #[must_use]
    pub fn is_supported(&self, code: &str) -> bool {
        self.supported.iter().any(|s| s == code)
    }

    /// Resolves the locale from the inbound cookie value.
    #[must_use]
    pub fn resolve(&self, cookie: Option<&str>) -> Locale {
        match cookie {
            Some(code) if self.is_supported(code) => Locale(code.to_string()),
            _ => self.default_locale(),
        }
    }

    /// Queues the default locale cookie when the inbound one is missing or
    /// invalid. Returns `true` if a cookie was queued.
    pub fn ensure_cookie(&self, cookie: Option<&str>, jar: &mut CookieJar) -> bool {
        if cookie.is_some_and(|code| self.is_supported(code)) {
            return false;
        }
        jar.push(self.locale_cookie(&self.default));
        true
    }

    /// Builds the persistence cookie for `code`.
    #[must_use]
    pub fn locale_cookie(&self, code: &str) -> SetCookie {
        SetCookie::new(self.cookie_name.clone(), code)
            .path("/")
            .max_age_secs(self.max_age_secs)
            .same_site(SameSite::Lax)
    }
}
