//! In-process cache store.
//!
//! Entries live in a concurrent map with an optional deadline each. Expired
//! entries are dropped lazily on read and by a background sweep task that
//! runs until the store is closed or dropped.

use crate::error::{CacheError, CacheResult};
use crate::item::CacheItem;
use crate::store::CacheStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default interval between expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct MemoryEntry {
    item: CacheItem,
    /// `None` never expires
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses, expired reads included
    pub misses: u64,
    /// Current number of entries
    pub entries: usize,
    /// Entries removed because they expired
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Concurrent in-process store
pub struct MemoryStore {
    entries: Arc<DashMap<String, MemoryEntry>>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    closed: AtomicBool,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryStore {
    /// Create a store and start its sweep task on the current Tokio runtime
    ///
    /// Outside a runtime no sweep task runs and expiry is only enforced on read.
    #[must_use]
    pub fn new(sweep_interval: Duration) -> Self {
        let store = Self {
            entries: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(sweep_loop(
                    Arc::clone(&store.entries),
                    Arc::clone(&store.counters),
                    sweep_interval,
                    store.shutdown.clone(),
                ));
            }
            Err(_) => debug!("No runtime available, cache sweep disabled"),
        }

        store
    }

    /// Number of stored entries, expired ones not yet swept included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Remove expired entries now
    pub fn cleanup_expired(&self) -> usize {
        sweep(&self.entries, &self.counters)
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        self.ensure_open()?;

        let now = Instant::now();
        let found = self.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.item.clone())
            }
        });

        match found {
            Some(Some(item)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache hit");
                Ok(Some(item))
            }
            Some(None) => {
                // Re-check under the shard lock so a concurrent fresh set survives
                if self
                    .entries
                    .remove_if(key, |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache miss (expired)");
                Ok(None)
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, item: &CacheItem, ttl_secs: u64) -> CacheResult<()> {
        self.ensure_open()?;

        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs));
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                item: item.clone(),
                expires_at,
            },
        );

        debug!(key = %key, ttl_secs, entries = self.entries.len(), "Response cached");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.ensure_open()?;
        self.entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.shutdown.cancel();
            self.entries.clear();
            debug!("Memory cache closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

async fn sweep_loop(
    entries: Arc<DashMap<String, MemoryEntry>>,
    counters: Arc<Counters>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                sweep(&entries, &counters);
            }
        }
    }

    debug!("Cache sweep task stopped");
}

fn sweep(entries: &DashMap<String, MemoryEntry>, counters: &Counters) -> usize {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    let removed = before.saturating_sub(entries.len());

    if removed > 0 {
        counters
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, "Expired cache entries removed");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(body: &str) -> CacheItem {
        CacheItem::new(
            body.as_bytes().to_vec(),
            [
                ("Content-Type", vec!["text/plain".to_string()]),
                ("Date", vec!["today".to_string()]),
            ],
        )
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::default();
        store.set("k", &item("hello"), 60).await.unwrap();

        let cached = store.get("k").await.unwrap().unwrap();
        assert_eq!(cached.body(), b"hello");
        assert!(cached.headers().contains_key("content-type"));
        assert!(!cached.headers().contains_key("date"));

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::default();
        assert!(store.get("missing").await.unwrap().is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_expiry_on_read() {
        let store = MemoryStore::default();
        store.set("k", &item("short"), 1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
        assert_eq!(store.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = MemoryStore::default();
        store.set("k", &item("forever"), 0).await.unwrap();
        assert_eq!(store.cleanup_expired(), 0);
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired() {
        let store = MemoryStore::new(Duration::from_millis(50));
        store.set("old", &item("a"), 1).await.unwrap();
        store.set("keep", &item("b"), 60).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(store.len(), 1);
        assert!(store.get("keep").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_overwrites_and_delete() {
        let store = MemoryStore::default();
        store.set("k", &item("one"), 60).await.unwrap();
        store.set("k", &item("two"), 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().body(), b"two");

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_stops_sweep_and_rejects_operations() {
        let store = MemoryStore::new(Duration::from_millis(10));
        store.set("k", &item("x"), 60).await.unwrap();

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(store.shutdown.is_cancelled());
        assert!(store.is_empty());
        assert!(matches!(store.get("k").await, Err(CacheError::Closed)));
        assert!(matches!(
            store.set("k", &item("x"), 60).await,
            Err(CacheError::Closed)
        ));
    }

    #[test]
    fn test_store_outside_runtime() {
        let store = MemoryStore::default();
        assert!(store.is_empty());
        assert!(!store.shutdown.is_cancelled());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert!((CacheStats::default().hit_rate()).abs() < f64::EPSILON);
    }
}
