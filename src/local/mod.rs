//! In-process counter store.
//!
//! [`MemoryCounterStore`] keeps counters in this process using thread-safe data
//! structures ([`DashMap`](dashmap::DashMap)). It implements the same
//! [`CounterStore`](crate::CounterStore) contract as the Redis store, so buckets behave the
//! same over either.
//!
//! # Key Characteristics
//!
//! - **Thread-safe:** Safe for concurrent use across multiple threads
//! - **Zero external dependencies:** No network or database required
//! - **Process-scoped:** Counters are not shared across processes
//!
//! # When to Use
//!
//! ✅ **Use the memory store when:**
//! - Single-process application
//! - Tests that exercise bucket logic without a Redis server
//!
//! ❌ **Don't use the memory store when:**
//! - Multiple application instances need shared quotas
//! - Quotas must survive process restarts

mod memory_counter_store;
pub use memory_counter_store::*;
