//! Coalescing request cache.
//!
//! Two tiers sit in front of a caller-supplied request function:
//!
//! 1. An in-flight map from cache key to a shared future. While a request for
//!    a key is outstanding every further caller joins it, so the request
//!    function runs at most once per key at a time.
//! 2. The session store. Settled successes are persisted (whole, or shrunk to
//!    a projection path) and served from there without another request.
//!
//! The store lookup runs inside the registered in-flight future, so callers
//! racing on a cold key cannot both miss the store and both issue a request.
//! Work is spawned onto the runtime: a caller dropping its future does not
//! cancel the request for the other waiters, and the in-flight entry is
//! always removed once the work settles.

mod key;

pub use key::request_cache_key;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use pageflow_core::{Error, SessionCache, path};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

/// Outcome shared by every caller coalesced onto one request.
pub type SharedResult = Result<CachedResponse, Arc<Error>>;

type InFlightRequest = Shared<BoxFuture<'static, SharedResult>>;

/// Per-call options for [`CoalescingCache::cached_request`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Skip both the store lookup and persisting the result.
    pub do_not_cache: bool,

    /// Dotted path of the only part of the response worth persisting.
    pub projection_path: Option<String>,
}

impl RequestOptions {
    pub fn uncached() -> Self {
        Self { do_not_cache: true, ..Self::default() }
    }

    pub fn projected(path: impl Into<String>) -> Self {
        Self { projection_path: Some(path.into()), ..Self::default() }
    }
}

/// Result of a cached request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedResponse {
    /// The full response, when the request function actually ran.
    pub raw: Option<Value>,

    /// The value as persisted: the response itself, the minimal shape around
    /// the projection path, or the not-found marker.
    pub projected: Value,

    /// Whether the value came from the session store.
    pub from_store: bool,
}

impl CachedResponse {
    /// Look up `path` in the projected value.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path::get_by_path(&self.projected, path)
    }
}

struct Inner {
    session: SessionCache,
    in_flight: Mutex<HashMap<String, InFlightRequest>>,
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlightRequest>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn resolve<F, Fut>(&self, key: &str, request: F, options: RequestOptions) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, Error>>,
    {
        if !options.do_not_cache
            && let Some(stored) = self.session.get_from_store::<Value>(key).await
        {
            tracing::debug!(key, "served request from session store");
            return Ok(CachedResponse { raw: None, projected: stored, from_store: true });
        }

        let raw = request().await.map_err(|e| {
            tracing::warn!(key, error = %e, "request failed");
            Arc::new(e)
        })?;

        let projected = match &options.projection_path {
            Some(projection) => path::project(&raw, projection),
            None => raw.clone(),
        };

        if !options.do_not_cache
            && let Err(e) = self.session.set_in_store(key, &projected).await
        {
            tracing::warn!(key, error = %e, "failed to persist request result");
        }

        Ok(CachedResponse { raw: Some(raw), projected, from_store: false })
    }
}

/// Removes the in-flight entry when the request work ends, however it ends.
struct InFlightGuard {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight().remove(&self.key);
    }
}

/// Request cache with at most one in-flight request per key.
///
/// Clones share the in-flight map and the session store.
#[derive(Clone)]
pub struct CoalescingCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CoalescingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingCache")
            .field("session", &self.inner.session)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl CoalescingCache {
    pub fn new(session: SessionCache) -> Self {
        Self { inner: Arc::new(Inner { session, in_flight: Mutex::new(HashMap::new()) }) }
    }

    /// The session store tier, for direct `get_from_store`/`set_in_store` use.
    pub fn session(&self) -> &SessionCache {
        &self.inner.session
    }

    /// Number of requests currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight().len()
    }

    /// Whether a request for `key` is currently outstanding.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inner.in_flight().contains_key(key)
    }

    /// Resolve `key`, running `request` only if nothing else can answer.
    ///
    /// A caller arriving while a request for `key` is outstanding receives
    /// that request's outcome, whatever its own `request` and `options`.
    /// Failures reach every coalesced caller as the same `Arc<Error>` and
    /// are never persisted, so the next call after a failure retries.
    pub async fn cached_request<F, Fut>(&self, key: &str, request: F, options: RequestOptions) -> SharedResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        if key.is_empty() {
            return Err(Arc::new(Error::InvalidInput("cache key must not be empty".into())));
        }

        let pending = {
            let mut in_flight = self.inner.in_flight();
            match in_flight.get(key) {
                Some(pending) => {
                    tracing::debug!(key, "joined in-flight request");
                    pending.clone()
                }
                None => {
                    let pending = self.start(key, request, options);
                    in_flight.insert(key.to_string(), pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start<F, Fut>(&self, key: &str, request: F, options: RequestOptions) -> InFlightRequest
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let guard = InFlightGuard { inner: self.inner.clone(), key: key.to_string() };

        tokio::spawn(async move {
            let result = guard.inner.resolve(&guard.key, request, options).await;
            drop(guard);
            let _ = tx.send(result);
        });

        let key = key.to_string();
        rx.map(move |received| {
            received.unwrap_or_else(|_| Err(Arc::new(Error::RequestAbandoned(key))))
        })
        .boxed()
        .shared()
    }
}
