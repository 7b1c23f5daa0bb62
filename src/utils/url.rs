//! Media URL normalization
//!
//! The backend hands back image locations in several shapes: absolute paths,
//! bare relative paths, HTTPS self-references while the client talks plain
//! HTTP, or fully qualified object-storage links. This module rewrites them
//! into one absolute URL reachable from the configured API origin.

use url::Url;

use crate::constants::DEFAULT_TRUSTED_MEDIA_MARKERS;

/// Rewrites backend media URLs against a configured API origin.
#[derive(Debug, Clone)]
pub struct ImageUrlNormalizer {
    base: String,
    trusted_markers: Vec<String>,
}

impl ImageUrlNormalizer {
    /// Create a normalizer for `base` using the default trusted media hosts.
    pub fn new(base: &str) -> Self {
        Self::with_trusted_markers(
            base,
            DEFAULT_TRUSTED_MEDIA_MARKERS.iter().map(|m| (*m).to_string()).collect(),
        )
    }

    /// Create a normalizer with an explicit list of trusted host markers.
    pub fn with_trusted_markers(base: &str, trusted_markers: Vec<String>) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            trusted_markers,
        }
    }

    /// The API origin with any trailing slash removed.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Normalize an optional URL. Never fails: anything that cannot be
    /// parsed is returned as given.
    pub fn normalize(&self, url: Option<&str>) -> Option<String> {
        let url = url?;
        if url.is_empty() {
            return Some(String::new());
        }

        if url.starts_with('/') {
            return Some(format!("{}{}", self.base, url));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Some(format!("{}/{}", self.base, url));
        }

        if self.trusted_markers.iter().any(|marker| url.contains(marker.as_str())) {
            return Some(url.to_string());
        }

        Some(self.rehost(url).unwrap_or_else(|| url.to_string()))
    }

    /// Move a foreign-host URL onto a plain-HTTP base origin.
    fn rehost(&self, url: &str) -> Option<String> {
        if !self.base.starts_with("http://") {
            return None;
        }

        let api = Url::parse(&self.base).ok()?;
        let target = Url::parse(url).ok()?;
        if target.host_str() == api.host_str() {
            return None;
        }

        let mut rehosted = format!("{}{}", self.base, target.path());
        if let Some(query) = target.query() {
            rehosted.push('?');
            rehosted.push_str(query);
        }
        if let Some(fragment) = target.fragment() {
            rehosted.push('#');
            rehosted.push_str(fragment);
        }
        Some(rehosted)
    }
}

/// Normalize `url` against `base` with the default trusted media hosts.
pub fn normalize_image_url(url: Option<&str>, base: &str) -> Option<String> {
    ImageUrlNormalizer::new(base).normalize(url)
}
