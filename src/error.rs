use crate::BucketState;

/// Error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// Redis error.
    #[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// The store rejected the configured credential while connecting.
    #[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
    #[error("authentication failed: {0}")]
    Authentication(redis::RedisError),

    /// The key does not exist in the store.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The key exists but carries no expiry.
    #[error("key has no expiry: {0}")]
    NoExpiry(String),

    /// The request would exceed the bucket capacity for the current window.
    #[error("bucket is full")]
    CapacityExceeded(BucketState),

    /// Invalid connection count.
    #[error("invalid connection count: {0}")]
    InvalidConnectionCount(String),
}
