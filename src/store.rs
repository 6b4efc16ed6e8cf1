//! The shared counter store contract.
//!
//! A [`CounterStore`] is the single source of truth for every bucket: buckets only cache
//! what they last read from it. Each method is one round trip to the store.

use std::{future::Future, time::Duration};

use crate::QuotaError;

/// Key-value counter primitives a bucket is reconciled against.
///
/// Implementations must make [`CounterStore::increment_by`] atomic with respect to other
/// increments on the same key. No other combination of calls needs to be ordered.
///
/// The crate ships [`MemoryCounterStore`](crate::local::MemoryCounterStore) and, with a
/// `redis-*` feature enabled, [`RedisCounterStore`](crate::redis::RedisCounterStore).
pub trait CounterStore: Send + Sync {
    /// Read the counter for `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn read_count(&self, key: &str) -> impl Future<Output = Result<Option<u64>, QuotaError>> + Send;

    /// Atomically add `amount` to the counter for `key`, creating it at 0 if absent.
    ///
    /// Returns the new total.
    fn increment_by(
        &self,
        key: &str,
        amount: u64,
    ) -> impl Future<Output = Result<u64, QuotaError>> + Send;

    /// Expire `key` after `ttl` (millisecond precision).
    fn set_expiry(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), QuotaError>> + Send;

    /// Remaining time to live of `key`.
    ///
    /// Fails with [`QuotaError::KeyNotFound`] if the key does not exist and with
    /// [`QuotaError::NoExpiry`] if it exists without a TTL.
    fn read_ttl(&self, key: &str) -> impl Future<Output = Result<Duration, QuotaError>> + Send;

    /// Health check.
    fn ping(&self) -> impl Future<Output = Result<(), QuotaError>> + Send;
}
