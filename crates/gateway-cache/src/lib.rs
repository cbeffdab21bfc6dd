//! # Gateway Cache
//!
//! Response caching for the API gateway, including:
//! - An in-process store with TTL expiry and a cancellable sweep task
//! - A Redis store relying on native key expiry
//! - A manager that picks the store and degrades gracefully on failure
//! - Header filtering and request fingerprinting

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod item;
pub mod key;
pub mod manager;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use item::{is_excluded_header, CacheItem, EXCLUDED_HEADERS};
pub use key::cache_key;
pub use manager::{CacheManager, StoreKind};
pub use memory::{CacheStats, MemoryStore, DEFAULT_SWEEP_INTERVAL};
pub use redis_store::{RedisStore, DEFAULT_CONNECT_TIMEOUT};
pub use store::CacheStore;
