//! Path classification.
//!
//! [`PathClassifier`] sorts every request path into exactly one
//! [`PathClass`]. Asset detection runs first, so a static file nested under a
//! protected prefix is still an asset.

use serde::{Deserialize, Serialize};

/// Classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    /// Static asset; bypasses locale and session handling entirely.
    Asset,
    /// Public route; no session required.
    Public,
    /// Everything else.
    Protected,
}

impl PathClass {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Public => "public",
            Self::Protected => "protected",
        }
    }
}

impl std::fmt::Display for PathClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure path classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClassifier {
    asset_prefixes: Vec<String>,
    asset_extensions: Vec<String>,
    favicon_path: String,
    brand_prefix: String,
    public_exact: Vec<String>,
    public_prefixes: Vec<String>,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PathClassifier {
    /// Starts a builder seeded with the default rules.
    #[must_use]
    pub fn builder() -> PathClassifierBuilder {
        PathClassifierBuilder::default()
    }

    /// Classifies a path. Total: every input maps to exactly one class.
    #[must_use]
    pub fn classify(&self, path: &str) -> PathClass {
        if self.is_asset(path) {
            PathClass::Asset
        } else if self.is_public(path) {
            PathClass::Public
        } else {
            PathClass::Protected
        }
    }

    /// Returns `true` for static assets.
    #[must_use]
    pub fn is_asset(&self, path: &str) -> bool {
        if path == self.favicon_path {
            return true;
        }
        if is_under(path, &self.brand_prefix)
            || self.asset_prefixes.iter().any(|p| is_under(path, p))
        {
            return true;
        }
        match extension(path) {
            Some(ext) => self
                .asset_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Returns `true` for routes reachable without a session.
    ///
    /// Does not consult asset rules; use [`classify`](Self::classify) for the
    /// ordered decision.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_exact.iter().any(|p| p == path)
            || self.public_prefixes.iter().any(|p| is_under(path, p))
    }
}

/// Builder for [`PathClassifier`].
#[derive(Debug, Clone)]
pub struct PathClassifierBuilder {
    asset_prefixes: Vec<String>,
    asset_extensions: Vec<String>,
    favicon_path: String,
    brand_prefix: String,
    public_exact: Vec<String>,
    public_prefixes: Vec<String>,
}

impl Default for PathClassifierBuilder {
    fn default() -> Self {
        Self {
            asset_prefixes: vec!["/_static/".to_string(), "/_image/".to_string()],
            asset_extensions: DEFAULT_ASSET_EXTENSIONS
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            favicon_path: "/favicon.ico".to_string(),
            brand_prefix: "/brand/".to_string(),
            public_exact: vec!["/".to_string()],
            public_prefixes: vec!["/auth".to_string(), "/api/cron/".to_string()],
        }
    }
}

/// File extensions treated as static assets by default.
pub const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "svg", "png", "jpg", "jpeg", "gif", "webp", "ico", "avif", "txt", "xml", "json", "map",
];

impl PathClassifierBuilder {
    /// Replaces the static asset prefixes.
    #[must_use]
    pub fn asset_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the asset extensions (without the leading dot).
    #[must_use]
    pub fn asset_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_extensions = extensions
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets the exact favicon path.
    #[must_use]
    pub fn favicon_path(mut self, path: impl Into<String>) -> Self {
        self.favicon_path = path.into();
        self
    }

    /// Sets the brand asset prefix.
    #[must_use]
    pub fn brand_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.brand_prefix = prefix.into();
        self
    }

    /// Replaces the exact-match public paths.
    #[must_use]
    pub fn public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_exact = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the public prefixes.
    #[must_use]
    pub fn public_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one public prefix.
    #[must_use]
    pub fn public_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.public_prefixes.push(prefix.into());
        self
    }

    /// Builds the classifier.
    #[must_use]
    pub fn build(self) -> PathClassifier {
        PathClassifier {
            asset_prefixes: self.asset_prefixes,
            asset_extensions: self.asset_extensions,
            favicon_path: self.favicon_path,
            brand_prefix: self.brand_prefix,
            public_exact: self.public_exact,
            public_prefixes: self.public_prefixes,
        }
    }
}

/// Returns `true` when `path` equals `prefix` or lies beneath it.
///
/// A trailing slash on the prefix is ignored, so `/auth` and `/auth/` both
/// match `/auth`, `/auth/` and `/auth/callback` but never `/authors`.
#[must_use]
pub fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_assets() {
        let c = PathClassifier::default();
        for path in [
            "/favicon.ico",
            "/_static/chunks/app.js",
            "/_image/x",
            "/brand/logo",
            "/logo.svg",
            "/app/inbox/report.JSON",
            "/robots.txt",
            "/sitemap.xml",
            "/bundle.js.map",
        ] {
            assert_eq!(c.classify(path), PathClass::Asset, "{path}");
        }
    }

    #[test]
    fn test_default_public() {
        let c = PathClassifier::default();
        for path in ["/", "/auth", "/auth/", "/auth/callback", "/api/cron/process-queue"] {
            assert_eq!(c.classify(path), PathClass::Public, "{path}");
        }
    }

    #[test]
    fn test_default_protected() {
        let c = PathClassifier::default();
        for path in [
            "/app",
            "/app/onboarding",
            "/authors",
            "/settings",
            "/api/workflows/1",
            "/api/cronjobs",
            "/api/internal/process-queue",
            "/.hidden",
            "/file.",
        ] {
            assert_eq!(c.classify(path), PathClass::Protected, "{path}");
        }
    }

    #[test]
    fn test_asset_wins_over_public_and_protected() {
        let c = PathClassifier::default();
        assert_eq!(c.classify("/auth/icon.png"), PathClass::Asset);
        assert_eq!(c.classify("/app/secret/icon.png"), PathClass::Asset);
    }

    #[test]
    fn test_extension_only_from_last_segment() {
        let c = PathClassifier::default();
        assert_eq!(c.classify("/app/v1.json/members"), PathClass::Protected);
    }

    #[test]
    fn test_builder_overrides() {
        let c = PathClassifier::builder()
            .asset_extensions([".CSS"])
            .public_prefixes(["/login"])
            .public_paths(Vec::<String>::new())
            .build();

        assert_eq!(c.classify("/site.css"), PathClass::Asset);
        assert_eq!(c.classify("/logo.png"), PathClass::Protected);
        assert_eq!(c.classify("/login/reset"), PathClass::Public);
        assert_eq!(c.classify("/"), PathClass::Protected);
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("/app", "/app"));
        assert!(is_under("/app/", "/app/"));
        assert!(is_under("/app/x", "/app/"));
        assert!(!is_under("/application", "/app"));
        assert!(!is_under("/ap", "/app"));
    }

    proptest! {
        #[test]
        fn classify_is_total_and_consistent(path in "/[a-zA-Z0-9_./-]{0,40}") {
            let c = PathClassifier::default();
            let class = c.classify(&path);
            match class {
                PathClass::Asset => prop_assert!(c.is_asset(&path)),
                PathClass::Public => {
                    prop_assert!(!c.is_asset(&path));
                    prop_assert!(c.is_public(&path));
                }
                PathClass::Protected => {
                    prop_assert!(!c.is_asset(&path));
                    prop_assert!(!c.is_public(&path));
                }
            }
        }

        #[test]
        fn brand_paths_are_always_assets(rest in "[a-z0-9/_-]{0,30}") {
            let c = PathClassifier::default();
            let path = format!("/brand/{rest}");
            prop_assert_eq!(c.classify(&path), PathClass::Asset);
        }
    }
}
