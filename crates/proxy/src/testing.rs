//! Programmable network double for policy, manifest, and lifecycle tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use outpost_client::{FetchedResponse, Method, Network, StatusCode, header};
use outpost_core::Error;
use url::Url;

#[derive(Clone)]
struct FakeRoute {
    status: u16,
    content_type: String,
    body: Vec<u8>,
    final_url: Option<String>,
}

/// In-memory network keyed by URL path. Unrouted paths answer 404; the
/// offline switch makes every fetch fail at the transport level.
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, FakeRoute>>,
    offline: AtomicBool,
    fetches: AtomicU64,
    methods: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            fetches: AtomicU64::new(0),
            methods: Mutex::new(Vec::new()),
        }
    }

    /// Register or replace the response served for `path`.
    pub fn route(&self, path: &str, status: u16, content_type: &str, body: &[u8]) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            FakeRoute { status, content_type: content_type.to_string(), body: body.to_vec(), final_url: None },
        );
    }

    /// Register a path that redirects, landing on `final_url` with a 200 body.
    pub fn route_redirect(&self, path: &str, final_url: &str, body: &[u8]) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            FakeRoute {
                status: 200,
                content_type: "text/html".to_string(),
                body: body.to_vec(),
                final_url: Some(final_url.to_string()),
            },
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total fetches issued, including failed ones.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Methods of every fetch issued, in order.
    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }

    /// Fabricate the response a fetch of `url` would produce, without
    /// counting it as network traffic. Handy for seeding stores in tests.
    pub fn response_for(&self, url: &str) -> FetchedResponse {
        let url = Url::parse(url).unwrap();
        self.lookup(&url)
    }

    fn lookup(&self, url: &Url) -> FetchedResponse {
        let route = self
            .routes
            .lock()
            .unwrap()
            .get(url.path())
            .cloned()
            .unwrap_or_else(|| FakeRoute {
                status: 404,
                content_type: "text/plain".to_string(),
                body: b"not found".to_vec(),
                final_url: None,
            });

        let final_url = route
            .final_url
            .as_deref()
            .map(|u| Url::parse(u).unwrap())
            .unwrap_or_else(|| url.clone());

        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, route.content_type.parse().unwrap());

        FetchedResponse {
            url: url.clone(),
            final_url,
            status: StatusCode::from_u16(route.status).unwrap(),
            content_type: Some(route.content_type),
            bytes: Bytes::from(route.body),
            headers,
            fetch_ms: 0,
        }
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, method: &Method, url: &Url) -> Result<FetchedResponse, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.methods.lock().unwrap().push(method.as_str().to_string());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{url}: network unreachable")));
        }

        Ok(self.lookup(url))
    }
}
