//! Redis cache store.
//!
//! Items are stored as JSON under `<prefix><key>` and expire through Redis'
//! native TTL. Connections go through `redis::aio::ConnectionManager`, which
//! multiplexes and reconnects on its own.

use crate::error::{CacheError, CacheResult};
use crate::item::CacheItem;
use crate::store::CacheStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::IntoConnectionInfo;
use std::time::Duration;
use tracing::{debug, info};

/// Deadline for connecting and answering the initial PING
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed store
pub struct RedisStore {
    connection: RwLock<Option<ConnectionManager>>,
    prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .field("connected", &self.connection.read().is_some())
            .finish()
    }
}

impl RedisStore {
    /// Connect to Redis, select `db`, and verify the connection with PING
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server does not answer
    /// within [`DEFAULT_CONNECT_TIMEOUT`]
    pub async fn connect(url: &str, db: i64, prefix: impl Into<String>) -> CacheResult<Self> {
        Self::connect_with_timeout(url, db, prefix, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Like [`RedisStore::connect`] with a custom deadline
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server does not answer in time
    pub async fn connect_with_timeout(
        url: &str,
        db: i64,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let mut info = url
            .into_connection_info()
            .map_err(|e| CacheError::connection(format!("Invalid Redis URL: {e}")))?;
        info.redis.db = db;

        let client = redis::Client::open(info)
            .map_err(|e| CacheError::connection(format!("Failed to create Redis client: {e}")))?;

        let handshake = async {
            let mut connection = ConnectionManager::new(client)
                .await
                .map_err(|e| CacheError::connection(format!("Failed to connect to Redis: {e}")))?;

            let pong: String = redis::cmd("PING")
                .query_async(&mut connection)
                .await
                .map_err(|e| CacheError::connection(format!("Redis PING failed: {e}")))?;
            debug!(reply = %pong, "Redis PING");
            Ok::<_, CacheError>(connection)
        };

        let connection = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| {
                CacheError::connection(format!(
                    "Redis did not answer within {}ms",
                    timeout.as_millis()
                ))
            })??;

        let prefix = prefix.into();
        info!(url = %redact_url(url), db, prefix = %prefix, "Redis cache connected");

        Ok(Self {
            connection: RwLock::new(Some(connection)),
            prefix,
        })
    }

    /// The key namespace prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn connection(&self) -> CacheResult<ConnectionManager> {
        self.connection.read().clone().ok_or(CacheError::Closed)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheItem>> {
        let mut conn = self.connection()?;
        let key = self.namespaced(key);

        let raw: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;

        match raw {
            Some(raw) => {
                debug!(key = %key, "Cache hit");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => {
                debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, item: &CacheItem, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.connection()?;
        let key = self.namespaced(key);
        let value = serde_json::to_string(item)?;

        if ttl_secs > 0 {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(ttl_secs)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await?;
        } else {
            redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await?;
        }

        debug!(key = %key, ttl_secs, "Response cached");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection()?;
        redis::cmd("DEL")
            .arg(self.namespaced(key))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        if self.connection.write().take().is_some() {
            debug!("Redis cache closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Mask the password in a Redis URL for logging
fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            // Only fails for URLs that cannot carry credentials
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}
