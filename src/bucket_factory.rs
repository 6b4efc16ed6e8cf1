use std::{sync::Arc, time::SystemTime};

use crate::{
    BucketName, Capacity, CounterStore, KeyPrefix, QuotaError, StoreBucket, WindowRate,
    common::remaining_after,
};

/// Configuration for [`BucketFactory`].
#[derive(Clone, Debug, Default)]
pub struct BucketFactoryOptions {
    /// Optional prefix for store keys.
    ///
    /// With a prefix, the counter for bucket `name` lives at `<prefix>:<name>`. Without
    /// one the name is used verbatim, so buckets share counters with any other process
    /// that uses the raw name.
    pub prefix: Option<KeyPrefix>,
}

/// Creates buckets whose state is rehydrated from a shared [`CounterStore`].
///
/// The store handle is injected and shared by every bucket the factory creates.
///
/// # Examples
///
/// ```no_run
/// use std::{sync::Arc, time::Duration};
///
/// use quotabucket::{
///     Bucket, BucketFactory, BucketFactoryOptions, BucketName, Capacity, ConsumeDecision,
///     WindowRate, local::MemoryCounterStore,
/// };
///
/// # async fn run() -> Result<(), quotabucket::QuotaError> {
/// let factory = BucketFactory::new(
///     Arc::new(MemoryCounterStore::new()),
///     BucketFactoryOptions::default(),
/// );
///
/// let name = BucketName::try_from("user_123").unwrap();
/// let capacity = Capacity::try_from(100).unwrap();
/// let rate = WindowRate::try_from(Duration::from_secs(60)).unwrap();
///
/// let mut bucket = factory.create(&name, capacity, rate).await?;
///
/// match bucket.consume(1).await? {
///     ConsumeDecision::Admitted(state) => { /* proceed, state.remaining left */ }
///     ConsumeDecision::Rejected(state) => { /* 429, retry after state.retry_after() */ }
/// }
/// # Ok(())
/// # }
/// ```
pub struct BucketFactory<S> {
    store: Arc<S>,
    prefix: Option<KeyPrefix>,
}

impl<S: CounterStore> BucketFactory<S> {
    /// Create a factory over `store`.
    pub fn new(store: Arc<S>, options: BucketFactoryOptions) -> Self {
        Self {
            store,
            prefix: options.prefix,
        }
    }

    /// The shared store handle.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store key for the bucket called `name`.
    pub fn store_key(&self, name: &BucketName) -> Arc<str> {
        match &self.prefix {
            Some(prefix) => Arc::from(format!("{}:{}", &**prefix, &**name)),
            None => Arc::from(&**name),
        }
    }

    /// Create a bucket reflecting the current store state for `name`.
    ///
    /// Does not write to the store. If no counter exists the bucket starts full with a
    /// reset estimate of `now + rate`; the window itself opens on the first admitted
    /// [`consume`](crate::Bucket::consume). Otherwise `remaining` and `reset` are derived
    /// from the counter and its TTL.
    ///
    /// `capacity` and `rate` belong to this bucket only. Buckets created with different
    /// parameters for the same name share one counter.
    pub async fn create(
        &self,
        name: &BucketName,
        capacity: Capacity,
        rate: WindowRate,
    ) -> Result<StoreBucket<S>, QuotaError> {
        let key = self.store_key(name);

        let (remaining, reset) = match self.store.read_count(&key).await? {
            None => (*capacity, SystemTime::now() + *rate),
            // The counter may expire between the two reads.
            Some(count) => match self.store.read_ttl(&key).await {
                Ok(ttl) => (remaining_after(*capacity, count), SystemTime::now() + ttl),
                Err(QuotaError::KeyNotFound(_)) => (*capacity, SystemTime::now() + *rate),
                Err(err) => return Err(err),
            },
        };

        Ok(StoreBucket::new(
            key,
            capacity,
            remaining,
            reset,
            rate,
            self.store.clone(),
        ))
    } // end method create
}

impl<S> Clone for BucketFactory<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            prefix: self.prefix.clone(),
        }
    }
}
