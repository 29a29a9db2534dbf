//! Request cache keys.

use sha2::{Digest, Sha256};

/// Cache key for a request to `url`.
///
/// Body-less requests are keyed by the URL alone; requests with a body get
/// the SHA-256 of the body appended, so two POSTs to one endpoint with
/// different payloads never share a cache slot.
pub fn request_cache_key(url: &url::Url, body: Option<&[u8]>) -> String {
    match body {
        None => url.as_str().to_string(),
        Some(body) => {
            let mut hasher = Sha256::new();
            hasher.update(body);
            format!("{}#{}", url.as_str(), hex::encode(hasher.finalize()))
        }
    }
}
