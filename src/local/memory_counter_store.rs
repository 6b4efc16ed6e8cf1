use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{CounterStore, QuotaError};

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MemoryEntry {
    pub count: u64,
    pub expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process [`CounterStore`].
///
/// Mirrors the Redis data model: one counter per key, optionally carrying an expiry.
/// Expired counters behave exactly like absent ones.
///
/// # Thread Safety
///
/// - Uses [`DashMap`](dashmap::DashMap) for concurrent key access
/// - Increments run under the key's shard lock, so they are atomic per key
/// - Safe to share behind an [`Arc`] without external synchronization
///
/// # Memory growth
///
/// Expired counters are evicted lazily when their key is read again. Keys that are never
/// touched again stay in memory until [`MemoryCounterStore::cleanup`] runs; use
/// [`MemoryCounterStore::run_cleanup_loop`] to run it periodically.
///
/// # Examples
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use quotabucket::local::MemoryCounterStore;
///
/// let store = Arc::new(MemoryCounterStore::new());
/// store.run_cleanup_loop(Duration::from_secs(30));
/// ```
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    entries: DashMap<String, MemoryEntry>,
    cleanup_running: AtomicBool,
    cleanup_generation: AtomicU64,
}

impl MemoryCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &DashMap<String, MemoryEntry> {
        &self.entries
    }

    /// Number of stored counters, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no counters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict every expired counter.
    ///
    /// Returns the number of counters removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired(now));

        before.saturating_sub(self.entries.len())
    } // end method cleanup

    /// Start a background thread that calls [`MemoryCounterStore::cleanup`] every
    /// `interval`.
    ///
    /// Idempotent: does nothing if a loop is already running. The thread holds a weak
    /// reference and exits once the store is dropped or
    /// [`MemoryCounterStore::stop_cleanup_loop`] is called.
    pub fn run_cleanup_loop(self: &Arc<Self>, interval: Duration) {
        if self
            .cleanup_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let generation = self.cleanup_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let store: Weak<Self> = Arc::downgrade(self);

        let spawned = thread::Builder::new()
            .name("quotabucket-cleanup".to_string())
            .spawn(move || {
                loop {
                    thread::sleep(interval);

                    let Some(store) = store.upgrade() else {
                        break;
                    };

                    if !store.cleanup_running.load(Ordering::Acquire)
                        || store.cleanup_generation.load(Ordering::Acquire) != generation
                    {
                        break;
                    }

                    let removed = store.cleanup();
                    if removed > 0 {
                        tracing::trace!(removed, "Evicted expired counters");
                    }
                }
            });

        if let Err(err) = spawned {
            tracing::error!(error = ?err, "Failed to spawn counter cleanup thread");
            self.cleanup_running.store(false, Ordering::Release);
        }
    } // end method run_cleanup_loop

    /// Stop the cleanup loop started by [`MemoryCounterStore::run_cleanup_loop`].
    ///
    /// Idempotent. The loop thread exits at its next tick without cleaning.
    pub fn stop_cleanup_loop(&self) {
        self.cleanup_generation.fetch_add(1, Ordering::AcqRel);
        self.cleanup_running.store(false, Ordering::Release);
    }
}

impl CounterStore for MemoryCounterStore {
    async fn read_count(&self, key: &str) -> Result<Option<u64>, QuotaError> {
        let now = Instant::now();

        let count = self
            .entries
            .get(key)
            .and_then(|entry| (!entry.is_expired(now)).then_some(entry.count));

        if count.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }

        Ok(count)
    }

    async fn increment_by(&self, key: &str, amount: u64) -> Result<u64, QuotaError> {
        let now = Instant::now();

        let mut entry = self.entries.entry(key.to_string()).or_default();
        if entry.is_expired(now) {
            *entry = MemoryEntry::default();
        }

        entry.count = entry.count.saturating_add(amount);

        Ok(entry.count)
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), QuotaError> {
        let now = Instant::now();

        if let Some(mut entry) = self.entries.get_mut(key)
            && !entry.is_expired(now)
        {
            entry.expires_at = Some(now + ttl);
        }

        Ok(())
    }

    async fn read_ttl(&self, key: &str) -> Result<Duration, QuotaError> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(key).map(|entry| *entry) else {
            return Err(QuotaError::KeyNotFound(key.to_string()));
        };

        match entry.expires_at {
            Some(at) if at <= now => Err(QuotaError::KeyNotFound(key.to_string())),
            Some(at) => Ok(at - now),
            None => Err(QuotaError::NoExpiry(key.to_string())),
        }
    }

    async fn ping(&self) -> Result<(), QuotaError> {
        Ok(())
    }
}
