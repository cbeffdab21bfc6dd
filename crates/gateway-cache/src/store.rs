//! Cache store abstraction.

use crate::error::CacheResult;
use crate::item::CacheItem;
use async_trait::async_trait;

/// A key-value store for cached responses
///
/// A TTL of zero seconds stores the item without expiration.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an item. Expired and missing keys are both `Ok(None)`.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem>>;

    /// Store an item, replacing any previous value
    async fn set(&self, key: &str, item: &CacheItem, ttl_secs: u64) -> CacheResult<()>;

    /// Remove an item. Missing keys are not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Release resources. Later operations may fail with `CacheError::Closed`.
    async fn close(&self) -> CacheResult<()>;

    /// Get the store name
    fn name(&self) -> &'static str;
}
