//! Request identity normalization for store lookups.

use sha2::{Digest, Sha256};
use url::Url;

/// Whether the query string participates in request identity.
///
/// Matching mode is a parameter of every lookup rather than a global so that
/// each policy declares its own matching behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Query string is part of the key; `/a?x=1` and `/a?x=2` are distinct.
    Include,
    /// Query string is ignored; `/a?x=1` and `/a?x=2` share one entry.
    Exclude,
}

/// Compute the normalized store key for a request.
///
/// Identity is method + scheme + host + path, with the query string folded in
/// only under [`QueryMode::Include`]. The fragment never participates.
pub fn entry_key(method: &str, url: &Url, mode: QueryMode) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.scheme().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.host_str().unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(url.path().as_bytes());
    if mode == QueryMode::Include {
        hasher.update(b"\n");
        hasher.update(url.query().unwrap_or("").as_bytes());
    }
    hex::encode(hasher.finalize())
}
