//! Cache error types.

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by cache stores
///
/// None of these reach the client; callers log them and continue uncached.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached or configured
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// A store operation failed
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// An item could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store was closed
    #[error("Cache store is closed")]
    Closed,
}

impl CacheError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Connection(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}
