//! Key normalization — every key is reduced to a canonical string form
//! before lookup.
//!
//! The cache's key space is *stringified identity*: two keys with the same
//! canonical form refer to the same entry, so `42u64` and `"42"` collide.
//! This is a documented property of the data model, not an accident.
//!
//! # Example
//! ```
//! use rondo::CacheKey;
//!
//! assert_eq!(42u64.canonical(), "42".canonical());
//! assert_eq!("".canonical(), "");
//! ```

use std::fmt::Display;

/// Canonical string identity for cache keys.
///
/// The conversion must be total and pure: it never fails and always maps
/// equal inputs to equal strings. The blanket impl covers every
/// [`Display`] type, which is what makes `cache.set("a", ..)` and
/// `cache.set(7, ..)` both work against the same cache.
pub trait CacheKey {
    fn canonical(&self) -> String;
}

impl<T: Display + ?Sized> CacheKey for T {
    fn canonical(&self) -> String {
        self.to_string()
    }
}
