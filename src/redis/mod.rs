//! Redis-backed counter store.
//!
//! Buckets created over a [`RedisCounterStore`] share their counters with every other
//! process that points at the same Redis and uses the same bucket names.
//!
//! # Data model
//!
//! One string key per bucket holding an integer counter:
//!
//! - `GET` reads the count consumed in the current window
//! - `INCRBY` records admitted units
//! - `PEXPIRE` is set once per window, by the call that takes the counter from absent to
//!   its first amount
//! - `PTTL` feeds the reset estimate
//!
//! When the expiry fires Redis deletes the key and the next consumption opens a new
//! window.
//!
//! # Requirements
//!
//! - **Runtime:** Tokio or Smol (via `redis-tokio` or `redis-smol` features)

mod redis_counter_store;
pub use redis_counter_store::*;
