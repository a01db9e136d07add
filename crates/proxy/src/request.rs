//! Request and response types crossing the interception boundary.
//!
//! The external dispatcher hands the proxy one [`ProxyRequest`] per
//! intercepted request and receives exactly one [`ProxyResponse`] (or an
//! error) back. How requests arrive is the dispatcher's business.

use bytes::Bytes;
use outpost_client::{FetchedResponse, Method};
use outpost_core::StoredEntry;
use url::Url;

/// Resource-kind hint declared by the requesting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Document,
    Script,
    Style,
    Image,
    Font,
    Other,
}

/// An outbound request as described by the application layer.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub kind: ResourceKind,
}

impl ProxyRequest {
    /// Build a request descriptor from a URL string.
    ///
    /// Non-HTTP(S) schemes parse fine here; they are bypassed later by the
    /// classifier, not rejected at construction.
    pub fn new(method: Method, url: &str, kind: ResourceKind) -> Result<Self, outpost_core::Error> {
        let url = Url::parse(url.trim()).map_err(|e| outpost_core::Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self { method, url, kind })
    }

    /// Convenience constructor for retrieval requests.
    pub fn get(url: &str, kind: ResourceKind) -> Result<Self, outpost_core::Error> {
        Self::new(Method::GET, url, kind)
    }

    /// Retrieval methods are the only ones the proxy intercepts.
    pub fn is_retrieval(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// Whether the URL is in proxy-addressable (http/https) space.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Live network response.
    Network,
    /// Replayed from the durable store.
    Store,
    /// Synthesized fallback (offline image placeholder).
    Placeholder,
}

/// The single response returned for every intercepted request.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub served: ServedFrom,
}

/// 1x1 transparent GIF served when an uncached image cannot be fetched.
pub(crate) const PLACEHOLDER_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff,
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02,
    0x02, 0x44, 0x01, 0x00, 0x3b,
];

impl ProxyResponse {
    /// Wrap a live network response verbatim.
    pub(crate) fn from_network(resp: FetchedResponse) -> Self {
        let headers = resp
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        Self {
            status: resp.status.as_u16(),
            content_type: resp.content_type,
            headers,
            body: resp.bytes,
            served: ServedFrom::Network,
        }
    }

    /// Replay a captured response from the store.
    pub(crate) fn from_entry(entry: StoredEntry) -> Self {
        let headers = entry
            .headers_json
            .as_deref()
            .and_then(|j| serde_json::from_str::<Vec<(String, String)>>(j).ok())
            .unwrap_or_default();

        Self {
            status: entry.status,
            content_type: entry.content_type,
            headers,
            body: Bytes::from(entry.body),
            served: ServedFrom::Store,
        }
    }

    /// Synthesize the offline image fallback.
    pub(crate) fn placeholder_image() -> Self {
        Self {
            status: 200,
            content_type: Some("image/gif".to_string()),
            headers: vec![("content-type".to_string(), "image/gif".to_string())],
            body: Bytes::from_static(PLACEHOLDER_GIF),
            served: ServedFrom::Placeholder,
        }
    }
}

/// Capture a qualifying network response as a whole store entry.
pub(crate) fn capture_entry(key: &str, method: &Method, resp: &FetchedResponse) -> StoredEntry {
    let headers: Vec<(String, String)> = resp
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    StoredEntry {
        key: key.to_string(),
        method: method.as_str().to_string(),
        url: resp.url.to_string(),
        status: resp.status.as_u16(),
        content_type: resp.content_type.clone(),
        headers_json: serde_json::to_string(&headers).ok(),
        body: resp.bytes.to_vec(),
        stored_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retrieval() {
        let get = ProxyRequest::get("https://shop.example/", ResourceKind::Document).unwrap();
        assert!(get.is_retrieval());

        let post = ProxyRequest::new(Method::POST, "https://shop.example/api/sales", ResourceKind::Other).unwrap();
        assert!(!post.is_retrieval());
    }

    #[test]
    fn test_non_http_scheme_constructs_but_flags() {
        let req = ProxyRequest::get("chrome-extension://abcdef/popup.html", ResourceKind::Document).unwrap();
        assert!(!req.is_http());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = ProxyRequest::get("not a url", ResourceKind::Other);
        assert!(result.is_err());
    }

    #[test]
    fn test_placeholder_is_valid_gif() {
        let resp = ProxyResponse::placeholder_image();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.served, ServedFrom::Placeholder);
        assert_eq!(&resp.body[..6], b"GIF89a");
        assert_eq!(resp.body.last(), Some(&0x3b));
    }

    #[test]
    fn test_entry_round_trips_headers() {
        let entry = StoredEntry {
            key: "k".into(),
            method: "GET".into(),
            url: "https://shop.example/app.js".into(),
            status: 200,
            content_type: Some("application/javascript".into()),
            headers_json: Some(r#"[["content-type","application/javascript"]]"#.into()),
            body: b"console.log(1)".to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        };

        let resp = ProxyResponse::from_entry(entry);
        assert_eq!(resp.served, ServedFrom::Store);
        assert_eq!(resp.headers, vec![("content-type".to_string(), "application/javascript".to_string())]);
        assert_eq!(&resp.body[..], b"console.log(1)");
    }
}
