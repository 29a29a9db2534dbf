//! URL canonicalization so equivalent resource URLs share one cache key.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a resource URL as found in a page.
///
/// Normalization steps:
/// 1. Trim surrounding whitespace
/// 2. Resolve protocol-relative `//host/...` and scheme-less input to https
/// 3. Lowercase the host and drop the scheme's default port
/// 4. Remove the fragment, which never reaches the server
/// 5. Keep the query string byte-for-byte
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let candidate = if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    // The url crate lowercases hosts and strips default ports while parsing.
    let mut parsed = url::Url::parse(&candidate).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    }

    parsed.set_fragment(None);
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_keeps_https_url() {
        let url = canonicalize("https://www.youtube.com/oembed?url=abc123&format=json").unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/oembed?url=abc123&format=json");
    }

    #[test]
    fn test_canonicalize_protocol_relative() {
        let url = canonicalize("//i.ytimg.com/vi/abc123/hqdefault.jpg").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("i.ytimg.com"));
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("  www.youtube.com/watch?v=abc123 ").unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn test_canonicalize_host_and_port() {
        let url = canonicalize("HTTPS://WWW.YouTube.com:443/watch").unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/watch");
    }

    #[test]
    fn test_canonicalize_strips_fragment() {
        let url = canonicalize("https://www.youtube.com/watch?v=abc123#t=30").unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("v=abc123"));
    }

    #[test]
    fn test_canonicalize_equivalent_inputs_match() {
        let a = canonicalize("https://Example.com/a?x=1#frag").unwrap();
        let b = canonicalize("example.com/a?x=1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonicalize_rejects() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
        assert!(matches!(canonicalize("chrome-extension://abc/page.html"), Err(UrlError::UnsupportedScheme(_))));
        assert!(matches!(canonicalize("https://"), Err(UrlError::InvalidUrl(_))));
    }
}
