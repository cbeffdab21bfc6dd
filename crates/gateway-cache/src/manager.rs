//! Cache manager selecting and owning the configured store.

use crate::error::CacheResult;
use crate::item::CacheItem;
use crate::memory::MemoryStore;
use crate::redis_store::RedisStore;
use crate::store::CacheStore;
use gateway_config::CacheConfig;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

/// Which store a manager ended up with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process map
    Memory,
    /// Remote Redis
    Redis,
}

impl StoreKind {
    /// Get the kind as a string
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the process' cache store
///
/// Store failures never propagate past the manager: reads degrade to misses
/// and writes are skipped, both with a warning.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    kind: StoreKind,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("kind", &self.kind)
            .finish()
    }
}

impl CacheManager {
    /// Build the manager described by the cache configuration
    ///
    /// Returns `None` when caching is disabled. A Redis store that cannot be
    /// reached falls back to the in-process store.
    pub async fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            info!("Response cache disabled");
            return None;
        }

        if config.use_redis {
            let url = config
                .redis_url
                .as_ref()
                .map(|url| url.expose_secret().clone())
                .unwrap_or_default();

            match RedisStore::connect(&url, config.redis_db, config.redis_prefix.clone()).await {
                Ok(store) => {
                    info!(store = "redis", "Response cache enabled");
                    return Some(Self::with_store(Arc::new(store), StoreKind::Redis));
                }
                Err(e) => {
                    warn!(error = %e, "Redis cache unavailable, falling back to memory cache");
                }
            }
        }

        info!(store = "memory", "Response cache enabled");
        Some(Self::memory(MemoryStore::new(config.sweep_interval)))
    }

    /// Wrap an in-process store
    #[must_use]
    pub fn memory(store: MemoryStore) -> Self {
        Self::with_store(Arc::new(store), StoreKind::Memory)
    }

    /// Wrap an arbitrary store
    #[must_use]
    pub fn with_store(store: Arc<dyn CacheStore>, kind: StoreKind) -> Self {
        Self { store, kind }
    }

    /// The store kind in use
    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Look up an item, treating store errors as misses
    pub async fn get(&self, key: &str) -> Option<CacheItem> {
        match self.store.get(key).await {
            Ok(item) => item,
            Err(e) => {
                warn!(key = %key, store = %self.kind, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Store an item, logging and skipping on failure
    pub async fn set(&self, key: &str, item: &CacheItem, ttl_secs: u64) {
        if let Err(e) = self.store.set(key, item, ttl_secs).await {
            warn!(key = %key, store = %self.kind, error = %e, "Cache write failed");
        }
    }

    /// Remove an item
    ///
    /// # Errors
    /// Returns the store's error
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.delete(key).await
    }

    /// Close the underlying store
    ///
    /// # Errors
    /// Returns the store's error
    pub async fn close(&self) -> CacheResult<()> {
        info!(store = %self.kind, "Closing response cache");
        self.store.close().await
    }
}
