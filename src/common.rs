use std::{
    ops::Deref,
    sync::Arc,
    time::{Duration, SystemTime},
};

use crate::QuotaError;

/// Snapshot of a bucket after an operation.
///
/// Snapshots are never mutated; every bucket operation produces a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketState {
    /// Maximum units admitted per window.
    pub capacity: u64,
    /// Units still available in the current window.
    pub remaining: u64,
    /// Estimated end of the current window.
    pub reset: SystemTime,
}

impl BucketState {
    /// Time left until [`BucketState::reset`], or zero if it has already passed.
    ///
    /// Useful for `Retry-After` style responses.
    pub fn retry_after(&self) -> Duration {
        self.reset
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

/// Outcome of [`Bucket::consume`](crate::Bucket::consume).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeDecision {
    /// The units were admitted and recorded in the store.
    Admitted(BucketState),
    /// The units would exceed the window capacity; nothing was recorded.
    Rejected(BucketState),
}

impl ConsumeDecision {
    /// Whether the units were admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, ConsumeDecision::Admitted(_))
    }

    /// The bucket snapshot carried by either outcome.
    pub fn state(&self) -> BucketState {
        match self {
            ConsumeDecision::Admitted(state) | ConsumeDecision::Rejected(state) => *state,
        }
    }

    /// Convert a rejection into [`QuotaError::CapacityExceeded`].
    pub fn into_result(self) -> Result<BucketState, QuotaError> {
        match self {
            ConsumeDecision::Admitted(state) => Ok(state),
            ConsumeDecision::Rejected(state) => Err(QuotaError::CapacityExceeded(state)),
        }
    }
}

/// Maximum number of units a bucket admits per window.
///
/// Must be greater than 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Capacity(u64);

impl Deref for Capacity {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for Capacity {
    type Error = &'static str;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err("Capacity must be greater than 0")
        } else {
            Ok(Self(value))
        }
    }
}

/// Length of a window.
///
/// The store expires counters with millisecond precision, so the window must be at
/// least 1ms and at most [`WindowRate::MAX`], the longest expiry `PEXPIRE` accepts.
/// Sub-millisecond remainders are truncated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowRate(Duration);

impl WindowRate {
    /// Longest accepted window: `i64::MAX` milliseconds.
    pub const MAX: Duration = Duration::from_millis(i64::MAX as u64);

    /// Window length in whole milliseconds.
    pub fn as_millis(&self) -> u64 {
        self.0.as_millis().min(u64::MAX as u128) as u64
    }
}

impl Deref for WindowRate {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Duration> for WindowRate {
    type Error = &'static str;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value < Duration::from_millis(1) {
            Err("Window rate must be at least 1ms")
        } else if value > Self::MAX {
            Err("Window rate must not exceed i64::MAX milliseconds")
        } else {
            Ok(Self(value))
        }
    }
}

/// A validated bucket name.
///
/// This is a string with the following constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq)]
pub struct BucketName(Arc<str>);

impl Deref for BucketName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<&str> for BucketName {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err("Bucket name must not be empty")
        } else if value.len() > 255 {
            Err("Bucket name must not be longer than 255 bytes")
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<String> for BucketName {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// A validated prefix for store keys.
///
/// Keys are built as `<prefix>:<name>`, so the prefix:
/// - Must not be empty
/// - Must not be longer than 64 bytes
/// - Must not contain colons
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq)]
pub struct KeyPrefix(Arc<str>);

impl Deref for KeyPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<&str> for KeyPrefix {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err("Key prefix must not be empty")
        } else if value.len() > 64 {
            Err("Key prefix must not be longer than 64 bytes")
        } else if value.contains(':') {
            Err("Key prefix must not contain colons")
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<String> for KeyPrefix {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Units left once `count` has been consumed; never negative, even when contention has
/// pushed the counter past capacity.
pub(crate) fn remaining_after(capacity: u64, count: u64) -> u64 {
    capacity - count.min(capacity)
}
