use std::{
    future::Future,
    sync::Arc,
    time::{Duration, SystemTime},
};

use crate::{
    BucketState, Capacity, ConsumeDecision, CounterStore, QuotaError, WindowRate,
    common::remaining_after,
};

/// A named quota that admits units against a recurring window.
///
/// A bucket value is single-owner: [`Bucket::consume`] takes `&mut self`. Callers that
/// share a quota across tasks or processes each hold their own bucket for the same name
/// and coordinate only through the store.
pub trait Bucket {
    /// Maximum units per window.
    fn capacity(&self) -> u64;

    /// Units left in the window, as of the last successful operation.
    fn remaining(&self) -> u64;

    /// Estimated end of the window, as of the last successful operation.
    fn reset(&self) -> SystemTime;

    /// Snapshot of the last successful operation.
    fn state(&self) -> BucketState {
        BucketState {
            capacity: self.capacity(),
            remaining: self.remaining(),
            reset: self.reset(),
        }
    }

    /// Try to admit `amount` units against the current window.
    fn consume(
        &mut self,
        amount: u64,
    ) -> impl Future<Output = Result<ConsumeDecision, QuotaError>> + Send;
}

/// Fixed-window bucket reconciled against a [`CounterStore`].
///
/// The store holds one counter per bucket name. The first admitted increment of a window
/// attaches an expiry of `rate` to the counter; when it fires the counter disappears and
/// the next consumption opens a fresh window from zero. There is no smoothing between
/// windows.
///
/// # Concurrency
///
/// **Admission is read-then-increment, not a single atomic step.** Only the increment is
/// atomic in the store. Concurrent callers may all read a favorable count and all
/// increment, overshooting capacity by up to the sum of the amounts in flight minus one
/// of them. The next caller observes the overshoot (its `remaining` clamps to 0) and is
/// rejected. Limits are therefore soft under contention.
///
/// A caller whose cached `reset` has passed and which lands between the opener's
/// increment and its expiry call gets [`QuotaError::NoExpiry`], although its own
/// increment was already recorded.
///
/// # Caching
///
/// The bucket's own fields are a cache of the last successful call. They are recomputed
/// from the store on every [`Bucket::consume`], and left untouched when a call fails.
/// `reset` is refreshed lazily: the store's TTL is only queried once the cached value has
/// passed.
pub struct StoreBucket<S> {
    key: Arc<str>,
    capacity: u64,
    remaining: u64,
    reset: SystemTime,
    rate: WindowRate,
    store: Arc<S>,
}

impl<S: CounterStore> StoreBucket<S> {
    pub(crate) fn new(
        key: Arc<str>,
        capacity: Capacity,
        remaining: u64,
        reset: SystemTime,
        rate: WindowRate,
        store: Arc<S>,
    ) -> Self {
        Self {
            key,
            capacity: *capacity,
            remaining,
            reset,
            rate,
            store,
        }
    }

    /// The store key backing this bucket.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Window length applied when this bucket opens a window.
    pub fn rate(&self) -> Duration {
        *self.rate
    }

    /// Reset estimate for the current call.
    ///
    /// Keeps the cached value while it is in the future. A missing key means the window
    /// is not open, so a fresh window is assumed.
    async fn refreshed_reset(&self) -> Result<SystemTime, QuotaError> {
        let now = SystemTime::now();
        if self.reset > now {
            return Ok(self.reset);
        }

        match self.store.read_ttl(&self.key).await {
            Ok(ttl) => Ok(now + ttl),
            Err(QuotaError::KeyNotFound(_)) => Ok(now + *self.rate),
            Err(err) => Err(err),
        }
    }

    fn commit(&mut self, remaining: u64, reset: SystemTime) -> BucketState {
        self.remaining = remaining;
        self.reset = reset;
        self.state()
    }
}

impl<S: CounterStore> Bucket for StoreBucket<S> {
    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn remaining(&self) -> u64 {
        self.remaining
    }

    fn reset(&self) -> SystemTime {
        self.reset
    }

    /// Check admission and, if allowed, record `amount` in the store.
    ///
    /// # Behavior
    ///
    /// 1. Read the counter. A missing counter means the window is not open.
    /// 2. If `amount` exceeds what is left, return [`ConsumeDecision::Rejected`] with a
    ///    refreshed reset estimate. The store is not written.
    /// 3. Otherwise increment the counter. If the new total equals `amount`, this call
    ///    opened the window and sets its expiry to the bucket's rate.
    /// 4. Return [`ConsumeDecision::Admitted`] with `remaining` clamped to `0..=capacity`.
    ///
    /// # Errors
    ///
    /// Store failures are returned as-is and leave the cached snapshot unchanged. Nothing
    /// is retried.
    async fn consume(&mut self, amount: u64) -> Result<ConsumeDecision, QuotaError> {
        let remaining = match self.store.read_count(&self.key).await? {
            Some(count) => remaining_after(self.capacity, count),
            None => self.capacity,
        };

        if amount > remaining {
            let reset = self.refreshed_reset().await?;
            tracing::debug!(
                key = %self.key,
                amount,
                remaining,
                "Rejected consumption over capacity"
            );

            return Ok(ConsumeDecision::Rejected(self.commit(remaining, reset)));
        }

        let total = self.store.increment_by(&self.key, amount).await?;

        if total == amount {
            self.store.set_expiry(&self.key, *self.rate).await?;
            tracing::debug!(
                key = %self.key,
                window_ms = self.rate.as_millis(),
                "Opened window"
            );
        }

        let reset = self.refreshed_reset().await?;

        Ok(ConsumeDecision::Admitted(
            self.commit(remaining_after(self.capacity, total), reset),
        ))
    } // end method consume
}
