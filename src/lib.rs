#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub use error::*;

mod common;
pub use common::{BucketName, BucketState, Capacity, ConsumeDecision, KeyPrefix, WindowRate};

mod store;
pub use store::*;

mod bucket;
pub use bucket::*;

mod bucket_factory;
pub use bucket_factory::*;

pub mod local;

#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
pub mod redis;

#[cfg(test)]
mod tests;
