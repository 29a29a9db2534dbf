//! JSON fetch client used to build request functions for the coalescing cache.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve `//host` and scheme-less input to `https`
//! - Lowercase host, drop default port, remove fragments
//! - Preserve query string
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Request timeout: 20s (configurable)
//!
//! Failures are reported, never retried; retry policy belongs to callers.

pub mod url;

use bytes::Bytes;
use pageflow_core::Error;
use pageflow_core::config::FetchSettings;
use reqwest::{Client, RequestBuilder, header};
use serde_json::Value;
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize};

use crate::coalesce::request_cache_key;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pageflow/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "pageflow/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&FetchSettings> for FetchConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            max_bytes: settings.max_bytes,
            timeout: settings.timeout(),
            ..Self::default()
        }
    }
}

/// A JSON request, identified by the cache key it would be stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRequest {
    pub url: reqwest::Url,
    pub body: Option<Value>,
}

impl JsonRequest {
    /// A GET request for `url`.
    pub fn get(url: &str) -> Result<Self, Error> {
        Ok(Self { url: canonicalize(url).map_err(|e| Error::InvalidUrl(e.to_string()))?, body: None })
    }

    /// A POST request sending `body` as JSON.
    pub fn post(url: &str, body: Value) -> Result<Self, Error> {
        Ok(Self { body: Some(body), ..Self::get(url)? })
    }

    /// The key this request is cached under: the URL, plus a body digest for POSTs.
    pub fn cache_key(&self) -> String {
        let body = self.body.as_ref().map(Value::to_string);
        request_cache_key(&self.url, body.as_deref().map(str::as_bytes))
    }
}

/// HTTP client returning parsed JSON bodies.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Send `request` and parse the response body as JSON.
    pub async fn fetch_json(&self, request: &JsonRequest) -> Result<Value, Error> {
        let start = Instant::now();

        let builder = match &request.body {
            Some(body) => self.http.post(request.url.clone()).json(body),
            None => self.http.get(request.url.clone()),
        };
        let bytes = self.send(builder.header(header::ACCEPT, "application/json")).await?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("response from {} is not JSON: {e}", request.url)))?;

        tracing::debug!(
            url = %request.url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "fetched JSON"
        );

        Ok(value)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Bytes, Error> {
        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        Ok(bytes)
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn classify(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::HttpError(format!("network error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "pageflow/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_settings() {
        let settings = FetchSettings { user_agent: "ytnt/2.0".into(), max_bytes: 1024, timeout_ms: 1500 };
        let config = FetchConfig::from(&settings);
        assert_eq!(config.user_agent, "ytnt/2.0");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_get_request_key_is_canonical_url() {
        let request = JsonRequest::get("WWW.YOUTUBE.COM/oembed?url=abc123#x").unwrap();
        assert_eq!(request.cache_key(), "https://www.youtube.com/oembed?url=abc123");
    }

    #[test]
    fn test_post_request_key_includes_body() {
        let a = JsonRequest::post("https://www.youtube.com/youtubei/v1/player", json!({"videoId": "a"})).unwrap();
        let b = JsonRequest::post("https://www.youtube.com/youtubei/v1/player", json!({"videoId": "b"})).unwrap();
        assert_ne!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("https://www.youtube.com/youtubei/v1/player#"));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(JsonRequest::get("ftp://example.com"), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }
}
