//! Shared snapshot cache with a short validity window.
//!
//! One most-recent snapshot is shared by every concurrent request in the
//! process. The mutex is held across a refresh, so callers that arrive
//! while a fetch is in flight wait for it and reuse the result instead of
//! issuing their own.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::fetch::{self, HttpClient};
use crate::parser::decode_snapshot;
use crate::snapshot::Snapshot;

/// Single-shot asynchronous source of a decoded feed snapshot.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch(&self, now_ms: i64) -> Result<Snapshot>;
}

/// Fetches the feed over HTTP and decodes it into a [`Snapshot`].
pub struct HttpSnapshotProvider<C> {
    client: C,
    url: String,
}

impl<C> HttpSnapshotProvider<C> {
    pub fn new(client: C, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl<C: HttpClient> SnapshotProvider for HttpSnapshotProvider<C> {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self, now_ms: i64) -> Result<Snapshot> {
        let bytes = fetch::fetch_bytes(&self.client, &self.url).await?;
        debug!(bytes = bytes.len(), "Feed bytes received, decoding");
        decode_snapshot(&bytes, now_ms)
    }
}

struct CacheEntry {
    snapshot: Arc<Snapshot>,
    fetched_at_ms: i64,
}

/// Time-to-live cache over a [`SnapshotProvider`].
///
/// Callers supply `now_ms` explicitly so tests can drive expiry with a
/// fixed clock.
pub struct FeedCache<P> {
    provider: P,
    ttl_ms: i64,
    entry: Mutex<Option<CacheEntry>>,
}

impl<P: SnapshotProvider> FeedCache<P> {
    pub fn new(provider: P, ttl: Duration) -> Self {
        FeedCache {
            provider,
            ttl_ms: ttl.as_millis() as i64,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached snapshot, refreshing through the provider when
    /// the entry is missing or older than the TTL. Fetch failures are
    /// propagated and never cached.
    pub async fn get(&self, now_ms: i64) -> Result<Arc<Snapshot>> {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if now_ms - cached.fetched_at_ms < self.ttl_ms {
                return Ok(Arc::clone(&cached.snapshot));
            }
        }

        debug!("Snapshot cache miss, refreshing");
        let snapshot = Arc::new(self.provider.fetch(now_ms).await?);
        *entry = Some(CacheEntry {
            snapshot: Arc::clone(&snapshot),
            fetched_at_ms: now_ms,
        });
        Ok(snapshot)
    }

    /// Drops the cached entry if it has outlived the TTL.
    pub async fn invalidate_if_expired(&self, now_ms: i64) {
        let mut entry = self.entry.lock().await;
        if let Some(cached) = entry.as_ref() {
            if now_ms - cached.fetched_at_ms >= self.ttl_ms {
                *entry = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new() -> Self {
            CountingProvider {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            CountingProvider {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl SnapshotProvider for CountingProvider {
        async fn fetch(&self, now_ms: i64) -> Result<Snapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(Snapshot {
                entities: vec![],
                header_epoch_sec: Some(now_ms / 1000),
                fetched_at_ms: now_ms,
            })
        }
    }

    #[tokio::test]
    async fn fresh_entry_is_reused() {
        let cache = FeedCache::new(CountingProvider::new(), Duration::from_secs(15));
        let a = cache.get(1_000).await.unwrap();
        let b = cache.get(10_000).await.unwrap();
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn expired_entry_triggers_refresh() {
        let cache = FeedCache::new(CountingProvider::new(), Duration::from_secs(15));
        cache.get(1_000).await.unwrap();
        let later = cache.get(16_000).await.unwrap();
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(later.fetched_at_ms, 16_000);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cache = FeedCache::new(CountingProvider::failing(), Duration::from_secs(15));
        assert!(cache.get(1_000).await.is_err());
        assert!(cache.get(2_000).await.is_err());
        // every call reaches the provider because errors are never stored
        assert_eq!(cache.provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_if_expired_drops_only_stale_entries() {
        let cache = FeedCache::new(CountingProvider::new(), Duration::from_secs(15));
        cache.get(1_000).await.unwrap();

        cache.invalidate_if_expired(10_000).await;
        assert!(cache.entry.lock().await.is_some());

        cache.invalidate_if_expired(16_000).await;
        assert!(cache.entry.lock().await.is_none());
    }
}
