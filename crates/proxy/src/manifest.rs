//! Install-time precaching of the application shell.
//!
//! The manifest is the build-owned, ordered list of URLs that must be present
//! for the shell to function offline. Population is best-effort: one broken
//! link never aborts the rest, and the outcome is a report, not an error.

use crate::request::capture_entry;
use outpost_client::{Method, Network};
use outpost_core::{QueryMode, StoreDb, entry_key};
use url::Url;

/// Ordered set of shell asset URLs, fixed for the lifetime of one store
/// version. Items may be relative to the application origin or absolute
/// (CDN assets).
#[derive(Debug, Clone)]
pub struct Manifest {
    urls: Vec<String>,
}

impl Manifest {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }
}

/// One manifest item that could not be captured, and why.
#[derive(Debug, Clone)]
pub struct PopulateFailure {
    pub url: String,
    pub reason: String,
}

/// Outcome of a population pass. Success is unconditional once every item
/// has been attempted; failures are informational.
#[derive(Debug, Clone, Default)]
pub struct PopulateReport {
    pub attempted: usize,
    pub stored: usize,
    pub failures: Vec<PopulateFailure>,
}

/// Fetch and capture every manifest item under `version`.
///
/// Relative items resolve against `origin`. Cross-origin and redirected
/// responses are stored here, unlike runtime captures: the manifest is a
/// trusted, build-owned list. Every item is attempted; each failure is
/// isolated and recorded.
pub async fn populate(
    store: &StoreDb, network: &dyn Network, version: &str, manifest: &Manifest, origin: &Url,
) -> PopulateReport {
    let mut report = PopulateReport::default();

    for raw in &manifest.urls {
        report.attempted += 1;

        let url = match origin.join(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                report
                    .failures
                    .push(PopulateFailure { url: raw.clone(), reason: format!("unsupported scheme: {}", url.scheme()) });
                continue;
            }
            Err(e) => {
                report
                    .failures
                    .push(PopulateFailure { url: raw.clone(), reason: e.to_string() });
                continue;
            }
        };

        match network.fetch(&Method::GET, &url).await {
            Ok(resp) if resp.status.is_success() => {
                let key = entry_key(Method::GET.as_str(), &url, QueryMode::Exclude);
                let entry = capture_entry(&key, &Method::GET, &resp);
                match store.put_entry(version, &entry).await {
                    Ok(true) => report.stored += 1,
                    Ok(false) => {
                        tracing::warn!("manifest item {} fetched but store version {version} is gone", url);
                        report
                            .failures
                            .push(PopulateFailure { url: raw.clone(), reason: "store version discarded".to_string() });
                    }
                    Err(err) => {
                        tracing::warn!("manifest item {} fetched but not persisted: {err}", url);
                        report
                            .failures
                            .push(PopulateFailure { url: raw.clone(), reason: err.to_string() });
                    }
                }
            }
            Ok(resp) => {
                tracing::warn!("manifest item {} answered {}", url, resp.status.as_u16());
                report
                    .failures
                    .push(PopulateFailure { url: raw.clone(), reason: format!("status {}", resp.status.as_u16()) });
            }
            Err(err) => {
                tracing::warn!("manifest item {} failed: {err}", url);
                report
                    .failures
                    .push(PopulateFailure { url: raw.clone(), reason: err.to_string() });
            }
        }
    }

    report
}
