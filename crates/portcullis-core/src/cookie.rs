//! Cookie model for the gate.
//!
//! Three pieces:
//!
//! - [`Cookies`] - the inbound `Cookie` header, parsed once per request
//! - [`SetCookie`] - a builder for a single `Set-Cookie` header value
//! - [`CookieJar`] - the ordered set of cookie mutations that must reach the
//!   final response, whatever that response turns out to be
//!
//! # Example
//!
//! ```
//! use portcullis_core::{CookieJar, Cookies, SameSite, SetCookie};
//!
//! let cookies = Cookies::parse("sb-access=abc; locale=en");
//! assert_eq!(cookies.get("locale"), Some("en"));
//!
//! let mut jar = CookieJar::new();
//! jar.push(SetCookie::new("locale", "en").path("/").same_site(SameSite::Lax));
//! assert!(jar.contains("locale"));
//! ```

use http::header::{self, HeaderMap, HeaderValue};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Cookies sent by the client in the `Cookie` header.
///
/// Lookups see unquoted values with the first duplicate winning; the raw
/// header values are kept alongside so the identity provider receives exactly
/// what the client sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    pairs: Vec<(String, String)>,
    index: HashMap<String, usize>,
    raw: Vec<String>,
}

impl Cookies {
    /// Creates an empty cookie set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw `Cookie` header value.
    ///
    /// Malformed pairs (no `=`, empty name) are skipped. When a name repeats,
    /// the first occurrence wins for lookups.
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let mut cookies = Self::new();
        let trimmed = header_value.trim();
        if !trimmed.is_empty() {
            cookies.raw.push(trimmed.to_string());
        }
        for pair in header_value.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                cookies.insert(name, value);
            }
        }
        cookies
    }

    /// Collects every `Cookie` header from a header map.
    ///
    /// HTTP/2 clients may split cookies across several headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::new();
        for value in headers.get_all(header::COOKIE) {
            if let Ok(raw) = value.to_str() {
                let parsed = Self::parse(raw);
                for (name, value) in parsed.pairs {
                    cookies.insert(&name, &value);
                }
                cookies.raw.extend(parsed.raw);
            }
        }
        cookies
    }

    fn insert(&mut self, name: &str, value: &str) {
        if self.index.contains_key(name) {
            return;
        }
        self.index.insert(name.to_string(), self.pairs.len());
        self.pairs.push((name.to_string(), value.to_string()));
    }

    /// Returns a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&i| self.pairs[i].1.as_str())
    }

    /// Returns `true` if the named cookie is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over `(name, value)` pairs in the order they arrived.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of distinct cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if no cookies were sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The `Cookie` header value to forward upstream.
    ///
    /// Parsed input comes back verbatim, several headers joined with `"; "`.
    /// Returns `None` when nothing was sent.
    #[must_use]
    pub fn to_header_value(&self) -> Option<String> {
        if self.raw.is_empty() {
            None
        } else {
            Some(self.raw.join("; "))
        }
    }
}

/// SameSite attribute for cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Sent with all requests.
    None,
    /// Sent with top-level navigations and same-site requests.
    Lax,
    /// Only sent with same-site requests.
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Lax => write!(f, "Lax"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// Builder for a `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    max_age: Option<Duration>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    /// Creates a new cookie with a name and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Creates a cookie that clears the named cookie on the client.
    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, "").path("/").max_age(Duration::ZERO)
    }

    /// Sets the Domain attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the Path attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the Max-Age attribute.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Sets the Max-Age attribute in seconds.
    #[must_use]
    pub fn max_age_secs(self, secs: u64) -> Self {
        self.max_age(Duration::from_secs(secs))
    }

    /// Sets the Secure flag.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the HttpOnly flag.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the SameSite attribute.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={domain}"));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("Path={path}"));
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }
}

/// A single pending cookie mutation: the cookie name and its full
/// `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieMutation {
    name: String,
    header_value: String,
}

impl CookieMutation {
    /// Name of the cookie being set.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The complete `Set-Cookie` value.
    #[must_use]
    pub fn header_value(&self) -> &str {
        &self.header_value
    }
}

/// Ordered cookie mutations destined for the outgoing response.
///
/// Provider-issued cookies are opaque: they are captured as raw `Set-Cookie`
/// strings and replayed unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    mutations: Vec<CookieMutation>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cookie built with [`SetCookie`].
    pub fn push(&mut self, cookie: SetCookie) {
        self.mutations.push(CookieMutation {
            name: cookie.name().to_string(),
            header_value: cookie.to_header_value(),
        });
    }

    /// Adds a raw `Set-Cookie` value captured from an upstream response.
    ///
    /// Values without a `name=` prefix are ignored.
    pub fn push_raw(&mut self, header_value: &str) {
        let header_value = header_value.trim();
        let Some((name, _)) = header_value.split_once('=') else {
            tracing::debug!("ignoring Set-Cookie value without a name");
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        self.mutations.push(CookieMutation {
            name: name.to_string(),
            header_value: header_value.to_string(),
        });
    }

    /// Moves every mutation from `other` to the end of this jar.
    pub fn merge(&mut self, other: CookieJar) {
        self.mutations.extend(other.mutations);
    }

    /// Returns `true` if a mutation for `name` is pending.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.mutations.iter().any(|m| m.name == name)
    }

    /// Iterates over pending mutations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CookieMutation> {
        self.mutations.iter()
    }

    /// Number of pending mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Appends one `Set-Cookie` header per mutation.
    ///
    /// Values that are not valid header text are dropped with a warning.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        for mutation in &self.mutations {
            match HeaderValue::from_str(&mutation.header_value) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(_) => {
                    tracing::warn!(cookie = %mutation.name, "dropping invalid Set-Cookie value");
                }
            }
        }
    }
}
