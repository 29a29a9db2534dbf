//! Namespaced, JSON-typed access to a [`SessionStore`].

use super::SessionStore;
use crate::Error;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Typed view over a session store, scoped to one key namespace.
///
/// Reads never surface unparseable data: an entry that fails to deserialize
/// is deleted and reported as absent.
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    namespace: String,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").field("namespace", &self.namespace).finish_non_exhaustive()
    }
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, namespace: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying store, for callers that need raw slot access.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Fully qualified store key for a caller key.
    pub fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Read and deserialize the value stored under `key`.
    ///
    /// Backend failures are logged and read as a miss.
    pub async fn get_from_store<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let slot = self.namespaced(key);
        let raw = match self.store.get_raw(&slot).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %slot, error = %e, "session store read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %slot, error = %e, "purging unparseable session entry");
                if let Err(e) = self.store.remove(&slot).await {
                    tracing::warn!(key = %slot, error = %e, "failed to purge session entry");
                }
                None
            }
        }
    }

    /// Serialize `value` and store it under `key`, replacing any earlier value.
    pub async fn set_in_store<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let raw = serde_json::to_string(value)?;
        self.store.set_raw(&self.namespaced(key), &raw).await
    }

    /// Delete the value stored under `key`.
    pub async fn remove_from_store(&self, key: &str) -> Result<bool, Error> {
        self.store.remove(&self.namespaced(key)).await
    }

    /// Delete every value in this namespace.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.store.clear_prefix(&self.namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SqliteStore};
    use serde::Deserialize;
    use serde_json::{Value, json};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Branding {
        title: String,
        language: Option<String>,
    }

    fn memory_cache() -> (MemoryStore, SessionCache) {
        let store = MemoryStore::new();
        let cache = SessionCache::new(Arc::new(store.clone()), "pageflow:");
        (store, cache)
    }

    #[tokio::test]
    async fn test_round_trip_json_values() {
        let (_, cache) = memory_cache();
        let values = [
            json!(null),
            json!(true),
            json!(-12.5),
            json!("ünïcode"),
            json!([1, "two", {"three": 3}]),
            json!({"nested": {"deeply": [null, {"x": 1}]}}),
        ];
        for (i, value) in values.iter().enumerate() {
            let key = format!("value-{i}");
            cache.set_in_store(&key, value).await.unwrap();
            assert_eq!(cache.get_from_store::<Value>(&key).await.as_ref(), Some(value));
        }
    }

    #[tokio::test]
    async fn test_round_trip_typed() {
        let (_, cache) = memory_cache();
        let branding = Branding { title: "X".into(), language: None };
        cache.set_in_store("oembed:abc123", &branding).await.unwrap();
        assert_eq!(cache.get_from_store::<Branding>("oembed:abc123").await, Some(branding));
    }

    #[tokio::test]
    async fn test_keys_are_namespaced() {
        let (store, cache) = memory_cache();
        cache.set_in_store("k", &1).await.unwrap();
        assert_eq!(store.get_raw("pageflow:k").await.unwrap().as_deref(), Some("1"));
        assert!(store.get_raw("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_purged() {
        let (store, cache) = memory_cache();
        store.set_raw("pageflow:broken", "{not json").await.unwrap();

        assert_eq!(cache.get_from_store::<Value>("broken").await, None);
        assert!(store.get_raw("pageflow:broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_purged_sqlite() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let cache = SessionCache::new(Arc::new(store.clone()), "pageflow:");
        store.set_raw("pageflow:broken", "undefined").await.unwrap();

        assert_eq!(cache.get_from_store::<Value>("broken").await, None);
        assert!(store.get_raw("pageflow:broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_purged() {
        let (store, cache) = memory_cache();
        cache.set_in_store("k", &json!({"unexpected": true})).await.unwrap();

        assert_eq!(cache.get_from_store::<Branding>("k").await, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let (_, cache) = memory_cache();
        cache.set_in_store("k", &json!({"a": 1})).await.unwrap();
        cache.set_in_store("k", &json!({"b": 2})).await.unwrap();
        assert_eq!(cache.get_from_store::<Value>("k").await, Some(json!({"b": 2})));
    }

    #[tokio::test]
    async fn test_clear_namespace() {
        let (store, cache) = memory_cache();
        cache.set_in_store("a", &1).await.unwrap();
        store.set_raw("foreign", "1").await.unwrap();

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(!cache.remove_from_store("a").await.unwrap());
        assert_eq!(store.len(), 1);
    }
}
