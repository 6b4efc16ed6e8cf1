use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::Barrier;

use crate::{
    Bucket, BucketFactory, BucketFactoryOptions, BucketName, Capacity, ConsumeDecision,
    CounterStore, QuotaError, WindowRate, local::MemoryCounterStore,
};

/// Holds every armed `read_count` until `parties` readers have arrived, so that all
/// reads land before any increment.
struct GatedStore {
    inner: MemoryCounterStore,
    armed: AtomicBool,
    barrier: Barrier,
}

impl GatedStore {
    fn new(parties: usize) -> Self {
        Self {
            inner: MemoryCounterStore::new(),
            armed: AtomicBool::new(false),
            barrier: Barrier::new(parties),
        }
    }

    async fn read_count_ungated(&self, key: &str) -> Option<u64> {
        self.inner.read_count(key).await.unwrap()
    }
}

impl CounterStore for GatedStore {
    async fn read_count(&self, key: &str) -> Result<Option<u64>, QuotaError> {
        let count = self.inner.read_count(key).await?;
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait().await;
        }

        Ok(count)
    }

    async fn increment_by(&self, key: &str, amount: u64) -> Result<u64, QuotaError> {
        self.inner.increment_by(key, amount).await
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), QuotaError> {
        self.inner.set_expiry(key, ttl).await
    }

    async fn read_ttl(&self, key: &str) -> Result<Duration, QuotaError> {
        self.inner.read_ttl(key).await
    }

    async fn ping(&self) -> Result<(), QuotaError> {
        self.inner.ping().await
    }
}

fn name(s: &str) -> BucketName {
    BucketName::try_from(s).unwrap()
}

#[test]
fn concurrent_reads_before_increments_overshoot_capacity() {
    const CALLERS: usize = 8;
    const CAPACITY: u64 = 3;

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let store = Arc::new(GatedStore::new(CALLERS));
        let factory = BucketFactory::new(store.clone(), BucketFactoryOptions::default());
        let rate = WindowRate::try_from(Duration::from_secs(60)).unwrap();

        let mut buckets = Vec::with_capacity(CALLERS);
        for _ in 0..CALLERS {
            buckets.push(
                factory
                    .create(&name("gated"), Capacity::try_from(CAPACITY).unwrap(), rate)
                    .await
                    .unwrap(),
            );
        }

        store.armed.store(true, Ordering::SeqCst);

        let handles: Vec<_> = buckets
            .into_iter()
            .map(|mut bucket| tokio::spawn(async move { bucket.consume(1).await.unwrap() }))
            .collect();

        let mut admitted = 0;
        for handle in handles {
            let decision = handle.await.unwrap();
            assert!(decision.state().remaining <= CAPACITY);
            if decision.is_admitted() {
                admitted += 1;
            }
        }

        // Every caller saw an empty counter, so every caller was admitted.
        assert_eq!(admitted, CALLERS);
        assert_eq!(
            store.read_count_ungated("gated").await,
            Some(CALLERS as u64)
        );

        // The overshoot is visible to the next caller.
        store.armed.store(false, Ordering::SeqCst);
        let mut late = factory
            .create(&name("gated"), Capacity::try_from(CAPACITY).unwrap(), rate)
            .await
            .unwrap();
        assert_eq!(late.remaining(), 0);

        let decision = late.consume(1).await.unwrap();
        assert!(matches!(decision, ConsumeDecision::Rejected(state) if state.remaining == 0));
    });
}

#[test]
fn concurrent_consumers_admit_between_capacity_and_callers() {
    const CALLERS: u64 = 64;
    const CAPACITY: u64 = 10;

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let store = Arc::new(MemoryCounterStore::new());
        let factory = BucketFactory::new(store.clone(), BucketFactoryOptions::default());
        let rate = WindowRate::try_from(Duration::from_secs(60)).unwrap();

        // Create every bucket before any window opens; a create that lands between the
        // opener's increment and its expiry would see a counter without a TTL.
        let mut buckets = Vec::new();
        for _ in 0..CALLERS {
            buckets.push(
                factory
                    .create(&name("contended"), Capacity::try_from(CAPACITY).unwrap(), rate)
                    .await
                    .unwrap(),
            );
        }

        let handles: Vec<_> = buckets
            .into_iter()
            .map(|mut bucket| tokio::spawn(async move { bucket.consume(1).await.unwrap() }))
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().is_admitted() {
                admitted += 1;
            }
        }

        assert!(admitted >= CAPACITY, "admitted {admitted} < capacity {CAPACITY}");
        assert!(admitted <= CALLERS, "admitted {admitted} > callers {CALLERS}");

        // Every admission is one increment; rejections never write.
        assert_eq!(store.read_count("contended").await.unwrap(), Some(admitted));
    });
}
