use std::time::Duration;

use super::runtime::{async_sleep, block_on};
use crate::{CounterStore, QuotaError, local::MemoryCounterStore};

#[test]
fn read_count_of_missing_key_is_none() {
    block_on(async {
        let store = MemoryCounterStore::new();
        assert_eq!(store.read_count("missing").await.unwrap(), None);
        assert!(store.is_empty());
    });
}

#[test]
fn increment_creates_at_zero_and_accumulates() {
    block_on(async {
        let store = MemoryCounterStore::new();

        assert_eq!(store.increment_by("k", 3).await.unwrap(), 3);
        assert_eq!(store.increment_by("k", 2).await.unwrap(), 5);
        assert_eq!(store.read_count("k").await.unwrap(), Some(5));
        assert_eq!(store.len(), 1);
    });
}

#[test]
fn read_ttl_distinguishes_missing_key_and_missing_expiry() {
    block_on(async {
        let store = MemoryCounterStore::new();

        assert!(matches!(
            store.read_ttl("k").await,
            Err(QuotaError::KeyNotFound(key)) if key == "k"
        ));

        store.increment_by("k", 1).await.unwrap();
        assert!(matches!(
            store.read_ttl("k").await,
            Err(QuotaError::NoExpiry(key)) if key == "k"
        ));

        store.set_expiry("k", Duration::from_secs(5)).await.unwrap();
        let ttl = store.read_ttl("k").await.unwrap();
        assert!(ttl > Duration::from_secs(4));
        assert!(ttl <= Duration::from_secs(5));
    });
}

#[test]
fn set_expiry_on_missing_key_is_a_no_op() {
    block_on(async {
        let store = MemoryCounterStore::new();

        store.set_expiry("ghost", Duration::from_secs(5)).await.unwrap();

        assert!(store.is_empty());
        assert!(matches!(
            store.read_ttl("ghost").await,
            Err(QuotaError::KeyNotFound(_))
        ));
    });
}

#[test]
fn expired_counter_behaves_as_absent() {
    block_on(async {
        let store = MemoryCounterStore::new();

        store.increment_by("k", 7).await.unwrap();
        store.set_expiry("k", Duration::from_millis(20)).await.unwrap();

        async_sleep(Duration::from_millis(60)).await;

        assert!(matches!(
            store.read_ttl("k").await,
            Err(QuotaError::KeyNotFound(_))
        ));
        assert_eq!(store.read_count("k").await.unwrap(), None);
        // The read evicted it.
        assert!(store.is_empty());

        // A new window starts from zero without an expiry.
        assert_eq!(store.increment_by("k", 2).await.unwrap(), 2);
        assert!(matches!(
            store.read_ttl("k").await,
            Err(QuotaError::NoExpiry(_))
        ));
    });
}

#[test]
fn increment_on_expired_entry_restarts_count() {
    block_on(async {
        let store = MemoryCounterStore::new();

        store.increment_by("k", 4).await.unwrap();
        store.set_expiry("k", Duration::from_millis(10)).await.unwrap();
        async_sleep(Duration::from_millis(40)).await;

        assert_eq!(store.increment_by("k", 1).await.unwrap(), 1);
        assert_eq!(store.entries().get("k").unwrap().expires_at, None);
    });
}

#[test]
fn cleanup_removes_only_expired_counters() {
    block_on(async {
        let store = MemoryCounterStore::new();

        store.increment_by("short", 1).await.unwrap();
        store.set_expiry("short", Duration::from_millis(10)).await.unwrap();
        store.increment_by("long", 1).await.unwrap();
        store.set_expiry("long", Duration::from_secs(60)).await.unwrap();
        store.increment_by("forever", 1).await.unwrap();

        async_sleep(Duration::from_millis(40)).await;

        assert_eq!(store.len(), 3);
        assert_eq!(store.cleanup(), 1);
        assert_eq!(store.len(), 2);
        assert!(!store.entries().contains_key("short"));
        assert_eq!(store.cleanup(), 0);
    });
}

#[test]
fn ping_always_succeeds() {
    block_on(async {
        let store = MemoryCounterStore::new();
        store.ping().await.unwrap();
    });
}
