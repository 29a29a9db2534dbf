//! `pageflow lookup`: concurrent callers resolving one resource.

use anyhow::Result;
use futures::future::{BoxFuture, join_all};
use pageflow_client::{CoalescingCache, FetchClient, FetchConfig, JsonRequest, RequestOptions};
use pageflow_core::{AppConfig, Error, MemoryStore, SessionCache, SessionStore, SqliteStore, StoreStats};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, clap::Args)]
pub struct LookupArgs {
    /// Resource URL, e.g. an oEmbed endpoint.
    pub url: String,

    /// JSON request body; sends a POST instead of a GET.
    #[arg(long)]
    pub body: Option<String>,

    /// Dotted path of the only part of the response to keep.
    #[arg(long)]
    pub path: Option<String>,

    /// Number of callers asking at the same time.
    #[arg(long, default_value_t = 4)]
    pub callers: usize,

    /// Bypass the session store.
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Serialize)]
pub struct LookupReport {
    pub key: String,
    pub callers: usize,
    pub network_calls: usize,
    pub projected: Value,
    pub follow_up_from_store: bool,
    /// SQLite entry stats after the lookups; absent for the in-memory store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreStats>,
}

/// Open the session store named by the configuration.
///
/// The SQLite handle is returned alongside for diagnostics.
pub async fn open_session(config: &AppConfig) -> Result<(SessionCache, Option<SqliteStore>)> {
    let (store, sqlite): (Arc<dyn SessionStore>, _) = match &config.db_path {
        Some(path) => {
            let sqlite = SqliteStore::open(path).await?;
            (Arc::new(sqlite.clone()), Some(sqlite))
        }
        None => (Arc::new(MemoryStore::new()), None),
    };
    Ok((SessionCache::new(store, config.namespace.clone()), sqlite))
}

pub async fn run(config: &AppConfig, args: LookupArgs) -> Result<Value> {
    let request = match &args.body {
        Some(body) => JsonRequest::post(&args.url, serde_json::from_str(body)?)?,
        None => JsonRequest::get(&args.url)?,
    };
    let key = request.cache_key();
    let client = FetchClient::new(FetchConfig::from(&config.fetch))?;
    let (session, sqlite) = open_session(config).await?;
    let cache = CoalescingCache::new(session);
    let options = RequestOptions { do_not_cache: args.no_cache, projection_path: args.path };

    let fetch = move || -> BoxFuture<'static, Result<Value, Error>> {
        let client = client.clone();
        let request = request.clone();
        Box::pin(async move { client.fetch_json(&request).await })
    };

    let mut report = lookup(&cache, &key, args.callers, options, fetch).await?;
    if let Some(sqlite) = sqlite {
        report.store = Some(sqlite.stats().await?);
    }
    Ok(serde_json::to_value(report)?)
}

/// Issue `callers` concurrent lookups of `key`, then one more after they settle.
pub async fn lookup<F>(
    cache: &CoalescingCache, key: &str, callers: usize, options: RequestOptions, fetch: F,
) -> Result<LookupReport>
where
    F: Fn() -> BoxFuture<'static, Result<Value, Error>> + Clone + Send + Sync + 'static,
{
    let network_calls = Arc::new(AtomicUsize::new(0));
    let counted = {
        let network_calls = network_calls.clone();
        move || {
            network_calls.fetch_add(1, Ordering::SeqCst);
            fetch()
        }
    };

    let callers = callers.max(1);
    let lookups = (0..callers).map(|_| cache.cached_request(key, counted.clone(), options.clone()));
    let mut projected = Value::Null;
    for result in join_all(lookups).await {
        projected = result?.projected;
    }

    let follow_up = cache.cached_request(key, counted, options).await?;

    Ok(LookupReport {
        key: key.to_string(),
        callers,
        network_calls: network_calls.load(Ordering::SeqCst),
        projected,
        follow_up_from_store: follow_up.from_store,
        store: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn memory_cache() -> CoalescingCache {
        CoalescingCache::new(SessionCache::new(Arc::new(MemoryStore::new()), "pageflow:"))
    }

    fn fake_oembed() -> BoxFuture<'static, Result<Value, Error>> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!({"title": "X", "author_name": "Channel"}))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_coalesces_and_caches() {
        let cache = memory_cache();
        let report = lookup(&cache, "oembed:abc123", 5, RequestOptions::default(), fake_oembed).await.unwrap();

        assert_eq!(report.network_calls, 1);
        assert_eq!(report.callers, 5);
        assert!(report.follow_up_from_store);
        assert_eq!(report.projected["title"], json!("X"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_without_cache_refetches() {
        let cache = memory_cache();
        let report = lookup(&cache, "oembed:abc123", 3, RequestOptions::uncached(), fake_oembed).await.unwrap();

        assert_eq!(report.network_calls, 2);
        assert!(!report.follow_up_from_store);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_projection() {
        let cache = memory_cache();
        let report = lookup(&cache, "oembed:abc123", 2, RequestOptions::projected("title"), fake_oembed).await.unwrap();
        assert_eq!(report.projected, json!({"title": "X"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_failure_is_reported() {
        let cache = memory_cache();
        let failing = || -> BoxFuture<'static, Result<Value, Error>> {
            Box::pin(async { Err(Error::HttpError("status 404".into())) })
        };
        let err = lookup(&cache, "oembed:missing", 3, RequestOptions::default(), failing).await.unwrap_err();
        assert!(err.to_string().contains("HTTP_ERROR"));
    }

    #[tokio::test]
    async fn test_open_session_defaults_to_memory() {
        let config = AppConfig::default();
        let (session, sqlite) = open_session(&config).await.unwrap();
        assert_eq!(session.namespace(), "pageflow:");
        assert!(sqlite.is_none());
    }

    #[tokio::test]
    async fn test_open_session_sqlite_reports_stats() {
        let dir = std::env::temp_dir().join(format!("pageflow-lookup-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = AppConfig { db_path: Some(dir.join("session.sqlite")), ..AppConfig::default() };

        let (session, sqlite) = open_session(&config).await.unwrap();
        let cache = CoalescingCache::new(session);
        lookup(&cache, "oembed:abc123", 2, RequestOptions::default(), fake_oembed).await.unwrap();

        let stats = sqlite.unwrap().stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert!(stats.oldest.is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
