//! Two-generation rotating TTL cache.
//!
//! Entries expire between `expire_after` and `2 × expire_after` after
//! being written: writes land in the *active* generation, a background
//! rotation demotes it to *retired* once per TTL, and the following
//! rotation drops it. Purge listeners observe each retiring generation.

mod bucket;
mod cache;
mod error;
mod key;
mod metrics;
mod timer;
pub mod listener;

pub use bucket::{Bucket, Snapshot};
pub use cache::RotatingCache;
pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use listener::{ListenerId, PurgeListener};
pub use metrics::stats::Metrics;
pub use timer::Timer;
