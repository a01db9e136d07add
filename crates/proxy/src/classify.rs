//! Request classification.
//!
//! Pure mapping from a request descriptor to the caching policy that should
//! handle it. No side effects, no suspension.

use crate::request::{ProxyRequest, ResourceKind};
use outpost_core::Error;
use regex::RegexSet;

/// The caching policy class derived for a request.
///
/// Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Forward to network verbatim; the store is never touched.
    ApiPassthrough,
    /// Serve from store when present; fetch and capture on miss.
    ImageCacheFirst,
    /// Serve stale shell assets immediately, refresh in the background.
    ShellStaleWhileRevalidate,
    /// Same policy as shell, for everything else.
    StaticStaleWhileRevalidate,
}

/// Path suffixes treated as application shell files.
const SHELL_EXTENSIONS: &[&str] = &[".html", ".htm", ".js", ".mjs"];

/// Classifies requests by URL path and resource-kind hint.
pub struct Classifier {
    api_prefixes: Vec<String>,
    image_patterns: RegexSet,
}

impl Classifier {
    /// Build a classifier from configured API prefixes and image patterns.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if an image pattern is not a valid
    /// regex.
    pub fn new(api_prefixes: Vec<String>, image_patterns: &[String]) -> Result<Self, Error> {
        let image_patterns = RegexSet::new(image_patterns).map_err(|e| Error::InvalidPattern(e.to_string()))?;
        Ok(Self { api_prefixes, image_patterns })
    }

    /// Map a request to its policy class.
    ///
    /// Returns `None` for the bypass cases: non-retrieval methods and
    /// non-HTTP(S) schemes route directly to the network, unclassified.
    pub fn classify(&self, req: &ProxyRequest) -> Option<RequestClass> {
        if !req.is_http() || !req.is_retrieval() {
            return None;
        }

        let path = req.url.path();

        if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Some(RequestClass::ApiPassthrough);
        }

        if req.kind == ResourceKind::Image || self.image_patterns.is_match(path) {
            return Some(RequestClass::ImageCacheFirst);
        }

        if req.kind == ResourceKind::Document || SHELL_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return Some(RequestClass::ShellStaleWhileRevalidate);
        }

        Some(RequestClass::StaticStaleWhileRevalidate)
    }
}
