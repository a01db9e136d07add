//! URL canonicalization for consistent store keys.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an absolute URL string for fetching and store keying.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Require an http(s) scheme
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
///
/// The url crate lowercases the host during parsing.
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_basic() {
        let url = canonicalize("https://shop.example").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("shop.example"));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://SHOP.EXAMPLE/Index.html").unwrap();
        assert_eq!(url.host_str(), Some("shop.example"));
        assert_eq!(url.path(), "/Index.html");
    }

    #[test]
    fn test_canonicalize_remove_fragment() {
        let url = canonicalize("https://shop.example/index.html#cart").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/index.html");
    }

    #[test]
    fn test_canonicalize_preserve_query() {
        let url = canonicalize("https://shop.example/products?category=dairy&page=2").unwrap();
        assert_eq!(url.query(), Some("category=dairy&page=2"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://shop.example  ").unwrap();
        assert_eq!(url.as_str(), "https://shop.example/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("chrome-extension://abcdef/page.html");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        let result = canonicalize("");
        assert!(matches!(result, Err(UrlError::Empty)));
    }

    #[test]
    fn test_canonicalize_relative_rejected() {
        let result = canonicalize("/index.html");
        assert!(matches!(result, Err(UrlError::InvalidUrl(_))));
    }
}
