//! Per-class caching policies.
//!
//! Each policy is a contract over (request, store, network):
//!
//! - **ApiPassthrough** forwards verbatim; no offline guarantee by design.
//! - **ImageCacheFirst** returns a stored copy without touching the network;
//!   on a miss it fetches, captures, and returns, and on transport failure it
//!   synthesizes a placeholder instead of surfacing the error.
//! - **StaleWhileRevalidate** (shell and static) returns a stored copy
//!   immediately and refreshes it in a background task; a cold miss waits for
//!   the network and propagates its failure.
//!
//! A store-write failure is never a request failure: the entry is simply not
//! persisted and the in-flight response is unaffected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::classify::RequestClass;
use crate::request::{ProxyRequest, ProxyResponse, capture_entry};
use outpost_client::{FetchedResponse, Network};
use outpost_core::{Error, QueryMode, StoreDb, entry_key};
use tokio::task::JoinHandle;
use url::Url;

/// Result of executing a policy: the response for the caller, plus the
/// background refresh task when the policy spawned one.
///
/// The caller never waits on the refresh; the handle exists so tests (and a
/// join-at-shutdown path) can observe that it ran.
pub struct Executed {
    pub response: ProxyResponse,
    pub refresh: Option<JoinHandle<()>>,
}

impl Executed {
    fn done(response: ProxyResponse) -> Self {
        Self { response, refresh: None }
    }
}

/// Executes the per-class get/store/fallback algorithms.
pub struct PolicyEngine {
    store: StoreDb,
    network: Arc<dyn Network>,
    version: String,
    origin: Url,
    refreshes_completed: Arc<AtomicU64>,
}

impl PolicyEngine {
    pub fn new(store: StoreDb, network: Arc<dyn Network>, version: impl Into<String>, origin: Url) -> Self {
        Self { store, network, version: version.into(), origin, refreshes_completed: Arc::new(AtomicU64::new(0)) }
    }

    /// Number of background refresh tasks that have run to completion,
    /// whether or not they updated the store.
    pub fn completed_refreshes(&self) -> u64 {
        self.refreshes_completed.load(Ordering::SeqCst)
    }

    /// Run the policy matched for `req` and produce its single response.
    pub async fn execute(&self, class: RequestClass, req: &ProxyRequest) -> Result<Executed, Error> {
        match class {
            RequestClass::ApiPassthrough => self.passthrough(req).await,
            RequestClass::ImageCacheFirst => self.cache_first(req).await,
            RequestClass::ShellStaleWhileRevalidate | RequestClass::StaticStaleWhileRevalidate => {
                self.stale_while_revalidate(req).await
            }
        }
    }

    /// Forward to network verbatim. The store is never read or written, and
    /// transport failure propagates to the caller as-is.
    async fn passthrough(&self, req: &ProxyRequest) -> Result<Executed, Error> {
        let resp = self.network.fetch(&req.method, &req.url).await?;
        Ok(Executed::done(ProxyResponse::from_network(resp)))
    }

    async fn cache_first(&self, req: &ProxyRequest) -> Result<Executed, Error> {
        let key = entry_key(req.method.as_str(), &req.url, QueryMode::Exclude);

        if let Some(entry) = self.store.get_entry(&self.version, &key).await? {
            tracing::debug!("image cache hit for {}", req.url);
            return Ok(Executed::done(ProxyResponse::from_entry(entry)));
        }

        match self.network.fetch(&req.method, &req.url).await {
            Ok(resp) => {
                if qualifies(&resp, &self.origin) {
                    self.persist(&key, req, &resp).await;
                }
                Ok(Executed::done(ProxyResponse::from_network(resp)))
            }
            Err(err) => {
                tracing::warn!("image fetch for {} failed, serving placeholder: {err}", req.url);
                Ok(Executed::done(ProxyResponse::placeholder_image()))
            }
        }
    }

    async fn stale_while_revalidate(&self, req: &ProxyRequest) -> Result<Executed, Error> {
        let key = entry_key(req.method.as_str(), &req.url, QueryMode::Exclude);

        if let Some(entry) = self.store.get_entry(&self.version, &key).await? {
            tracing::debug!("serving {} stale, refreshing in background", req.url);
            let refresh = self.spawn_refresh(key, req.clone());
            return Ok(Executed { response: ProxyResponse::from_entry(entry), refresh: Some(refresh) });
        }

        // Cold miss: the caller must wait for the network, and its failure is
        // the caller's failure.
        let resp = self.network.fetch(&req.method, &req.url).await?;
        if qualifies(&resp, &self.origin) {
            self.persist(&key, req, &resp).await;
        }
        Ok(Executed::done(ProxyResponse::from_network(resp)))
    }

    /// Capture a response into the store. Write failure is logged and
    /// swallowed; the in-flight response is unaffected. A write against a
    /// discarded store version is skipped rather than recreating it.
    async fn persist(&self, key: &str, req: &ProxyRequest, resp: &FetchedResponse) {
        let entry = capture_entry(key, &req.method, resp);
        match self.store.put_entry(&self.version, &entry).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("store version {} gone, entry for {} not persisted", self.version, req.url),
            Err(err) => tracing::warn!("store write for {} failed, entry not persisted: {err}", req.url),
        }
    }

    /// Fire-and-forget refresh. Runs to completion regardless of whether the
    /// original caller is still listening; its only side effect is a store
    /// write.
    fn spawn_refresh(&self, key: String, req: ProxyRequest) -> JoinHandle<()> {
        let store = self.store.clone();
        let network = Arc::clone(&self.network);
        let version = self.version.clone();
        let origin = self.origin.clone();
        let completed = Arc::clone(&self.refreshes_completed);

        tokio::spawn(async move {
            match network.fetch(&req.method, &req.url).await {
                Ok(resp) if qualifies(&resp, &origin) => {
                    let entry = capture_entry(&key, &req.method, &resp);
                    match store.put_entry(&version, &entry).await {
                        Ok(true) => {}
                        Ok(false) => tracing::debug!("store version {version} gone, refresh for {} dropped", req.url),
                        Err(err) => tracing::warn!("background store write for {} failed: {err}", req.url),
                    }
                }
                Ok(resp) => {
                    tracing::debug!("refresh for {} did not qualify ({}), keeping stored copy", req.url, resp.status.as_u16());
                }
                Err(err) => {
                    tracing::debug!("refresh for {} failed, keeping stored copy: {err}", req.url);
                }
            }
            completed.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Whether a response qualifies for persistence by a runtime policy: success
/// status, same origin as the application, and not reached through a redirect
/// (a redirected body belongs to a different identity than the requested
/// one). Manifest population applies its own, looser rule.
pub(crate) fn qualifies(resp: &FetchedResponse, origin: &Url) -> bool {
    resp.status.is_success() && !resp.is_redirected() && resp.url.origin() == origin.origin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ResourceKind, ServedFrom};
    use crate::testing::FakeNetwork;

    fn get(url: &str, kind: ResourceKind) -> ProxyRequest {
        ProxyRequest::get(url, kind).unwrap()
    }

    async fn engine_with(network: Arc<FakeNetwork>) -> PolicyEngine {
        let store = StoreDb::open_in_memory().await.unwrap();
        store.register_version("v1").await.unwrap();
        let origin = Url::parse("https://shop.example/").unwrap();
        PolicyEngine::new(store, network, "v1", origin)
    }

    #[tokio::test]
    async fn test_api_passthrough_never_touches_store() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/products", 200, "application/json", b"[{\"sku\":1}]");
        let engine = engine_with(Arc::clone(&network)).await;

        // Pre-seed the exact key an API request would use; it must be ignored
        // on read and untouched on write.
        let req = get("https://shop.example/products?category=dairy", ResourceKind::Other);
        let key = entry_key("GET", &req.url, QueryMode::Exclude);
        let stale = capture_entry(&key, &req.method, &network.response_for("https://shop.example/products"));
        engine.store.put_entry("v1", &stale).await.unwrap();

        let executed = engine.execute(RequestClass::ApiPassthrough, &req).await.unwrap();
        assert_eq!(executed.response.served, ServedFrom::Network);
        assert_eq!(network.fetches(), 1);
        assert_eq!(engine.store.entry_count("v1").await.unwrap(), 1);

        let kept = engine.store.get_entry("v1", &key).await.unwrap().unwrap();
        assert_eq!(kept.body, stale.body);
    }

    #[tokio::test]
    async fn test_api_passthrough_propagates_network_failure() {
        let network = Arc::new(FakeNetwork::new());
        network.set_offline(true);
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/api/sales", ResourceKind::Other);
        let result = engine.execute(RequestClass::ApiPassthrough, &req).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_image_fetched_once_then_served_from_store() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/assets/logo.jpg", 200, "image/jpeg", b"jpegbytes");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/assets/logo.jpg", ResourceKind::Image);

        let first = engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();
        assert_eq!(first.response.served, ServedFrom::Network);
        assert_eq!(network.fetches(), 1);

        let second = engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();
        assert_eq!(second.response.served, ServedFrom::Store);
        assert_eq!(&second.response.body[..], b"jpegbytes");
        assert_eq!(network.fetches(), 1);
    }

    #[tokio::test]
    async fn test_cached_image_served_offline() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/assets/logo.jpg", 200, "image/jpeg", b"jpegbytes");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/assets/logo.jpg", ResourceKind::Image);
        engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();

        network.set_offline(true);
        let fetches_before = network.fetches();

        let offline = engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();
        assert_eq!(offline.response.served, ServedFrom::Store);
        assert_eq!(&offline.response.body[..], b"jpegbytes");
        assert_eq!(network.fetches(), fetches_before);
    }

    #[tokio::test]
    async fn test_uncached_image_offline_yields_placeholder() {
        let network = Arc::new(FakeNetwork::new());
        network.set_offline(true);
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/assets/missing.jpg", ResourceKind::Image);
        let executed = engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();

        assert_eq!(executed.response.served, ServedFrom::Placeholder);
        assert_eq!(executed.response.status, 200);
        assert_eq!(executed.response.content_type.as_deref(), Some("image/gif"));
    }

    #[tokio::test]
    async fn test_image_error_status_passes_through_unpersisted() {
        let network = Arc::new(FakeNetwork::new());
        let engine = engine_with(Arc::clone(&network)).await;

        // Unrouted path: the fake network answers 404.
        let req = get("https://shop.example/assets/gone.jpg", ResourceKind::Image);
        let executed = engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();

        assert_eq!(executed.response.status, 404);
        assert_eq!(executed.response.served, ServedFrom::Network);
        assert_eq!(engine.store.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_swr_cold_miss_fetches_and_stores() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/index.html", 200, "text/html", b"<html>v1</html>");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/index.html", ResourceKind::Document);
        let executed = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();

        assert_eq!(executed.response.served, ServedFrom::Network);
        assert!(executed.refresh.is_none());
        assert_eq!(engine.store.entry_count("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_swr_hit_serves_stale_then_updates() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/index.html", 200, "text/html", b"<html>v1</html>");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/index.html", ResourceKind::Document);
        engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();

        network.route("/index.html", 200, "text/html", b"<html>v2</html>");

        let stale = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();
        assert_eq!(stale.response.served, ServedFrom::Store);
        assert_eq!(&stale.response.body[..], b"<html>v1</html>");

        stale.refresh.unwrap().await.unwrap();
        assert_eq!(engine.completed_refreshes(), 1);

        let fresh = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();
        assert_eq!(fresh.response.served, ServedFrom::Store);
        assert_eq!(&fresh.response.body[..], b"<html>v2</html>");
    }

    #[tokio::test]
    async fn test_swr_failed_refresh_keeps_entry() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/index.html", 200, "text/html", b"<html>v1</html>");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/index.html", ResourceKind::Document);
        engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();

        network.set_offline(true);

        let stale = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();
        assert_eq!(&stale.response.body[..], b"<html>v1</html>");
        stale.refresh.unwrap().await.unwrap();

        // Entry survives the failed refresh.
        let again = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();
        assert_eq!(&again.response.body[..], b"<html>v1</html>");
    }

    #[tokio::test]
    async fn test_swr_cold_miss_offline_propagates() {
        let network = Arc::new(FakeNetwork::new());
        network.set_offline(true);
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/index.html", ResourceKind::Document);
        let result = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_cross_origin_response_not_persisted() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/outfit.woff2", 200, "font/woff2", b"fontbytes");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://fonts.example/outfit.woff2", ResourceKind::Font);
        let executed = engine.execute(RequestClass::StaticStaleWhileRevalidate, &req).await.unwrap();

        // Served, but never captured: the origin differs from the application's.
        assert_eq!(executed.response.served, ServedFrom::Network);
        assert_eq!(&executed.response.body[..], b"fontbytes");
        assert_eq!(engine.store.entry_count("v1").await.unwrap(), 0);

        let again = engine.execute(RequestClass::StaticStaleWhileRevalidate, &req).await.unwrap();
        assert_eq!(again.response.served, ServedFrom::Network);
        assert_eq!(network.fetches(), 2);
    }

    #[tokio::test]
    async fn test_cross_origin_image_not_persisted() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/media/logo.png", 200, "image/png", b"pngbytes");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://cdn.example/media/logo.png", ResourceKind::Image);
        let executed = engine.execute(RequestClass::ImageCacheFirst, &req).await.unwrap();

        assert_eq!(executed.response.served, ServedFrom::Network);
        assert_eq!(engine.store.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_head_fetched_as_head_and_keyed_separately() {
        let network = Arc::new(FakeNetwork::new());
        network.route("/index.html", 200, "text/html", b"<html></html>");
        let engine = engine_with(Arc::clone(&network)).await;

        let req =
            ProxyRequest::new(outpost_client::Method::HEAD, "https://shop.example/index.html", ResourceKind::Document)
                .unwrap();
        engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();

        assert_eq!(network.methods(), vec!["HEAD".to_string()]);

        let head_key = entry_key("HEAD", &req.url, QueryMode::Exclude);
        let get_key = entry_key("GET", &req.url, QueryMode::Exclude);
        let stored = engine.store.get_entry("v1", &head_key).await.unwrap().unwrap();
        assert_eq!(stored.method, "HEAD");
        assert!(engine.store.get_entry("v1", &get_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_redirected_response_not_persisted() {
        let network = Arc::new(FakeNetwork::new());
        network.route_redirect("/old.html", "https://shop.example/new.html", b"<html>moved</html>");
        let engine = engine_with(Arc::clone(&network)).await;

        let req = get("https://shop.example/old.html", ResourceKind::Document);
        let executed = engine.execute(RequestClass::ShellStaleWhileRevalidate, &req).await.unwrap();

        assert_eq!(executed.response.served, ServedFrom::Network);
        assert_eq!(engine.store.entry_count("v1").await.unwrap(), 0);
    }
}
