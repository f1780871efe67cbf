//! A single cache generation: an insertion-ordered map from normalized
//! keys to values, with a memoized flattened view.
//!
//! Keys are normalized at this boundary (see [`CacheKey`]), so the map
//! never sees a non-string key. The flattened view returned by
//! [`Bucket::to_array`] is cached and shared: repeated calls return the
//! *same* allocation (observable via `Arc::ptr_eq`) until the next
//! mutation invalidates it.

use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;

use crate::error::{CacheError, Result};
use crate::key::CacheKey;

/// The flattened contents of a bucket: `(key, value)` pairs in insertion
/// order of the entries that are currently present.
pub type Snapshot<V> = Arc<[(String, Arc<V>)]>;

// ---------------------------------------------------------------------------
// Bucket
// ---------------------------------------------------------------------------

/// One generation of entries sharing an expiry window.
///
/// A bucket starts empty when its generation begins. Once demoted to
/// "retired" it never gains new keys from the live `set` path (new keys
/// always land in the active generation), though `remove` still applies.
pub struct Bucket<V> {
    entries: IndexMap<String, Arc<V>, RandomState>,
    /// Memoized flattened view; cleared on every mutation.
    snapshot: Option<Snapshot<V>>,
}

impl<V> Bucket<V> {
    pub fn new() -> Self {
        Bucket {
            entries: IndexMap::with_hasher(RandomState::new()),
            snapshot: None,
        }
    }

    /// Inserts or overwrites the entry for `key`'s canonical form.
    ///
    /// Overwriting keeps the entry's original position in insertion order.
    pub fn set<K: CacheKey + ?Sized>(&mut self, key: &K, value: V) {
        self.entries.insert(key.canonical(), Arc::new(value));
        self.snapshot = None;
    }

    /// Returns `true` iff an entry exists for `key`'s canonical form.
    pub fn has<K: CacheKey + ?Sized>(&self, key: &K) -> bool {
        self.entries.contains_key(&key.canonical())
    }

    /// Returns the stored value, or [`CacheError::NotFound`].
    pub fn get<K: CacheKey + ?Sized>(&self, key: &K) -> Result<Arc<V>> {
        self.entries
            .get(&key.canonical())
            .cloned()
            .ok_or(CacheError::NotFound)
    }

    /// Deletes the entry if present; no-op otherwise.
    ///
    /// Uses a shifting removal so the insertion order of the remaining
    /// entries is preserved in later snapshots.
    pub fn remove<K: CacheKey + ?Sized>(&mut self, key: &K) {
        if self.entries.shift_remove(&key.canonical()).is_some() {
            self.snapshot = None;
        }
    }

    /// Returns (and caches) the flattened contents.
    ///
    /// The returned allocation is reused across calls until the next
    /// `set`/`remove`.
    pub fn to_array(&mut self) -> Snapshot<V> {
        if let Some(snap) = &self.snapshot {
            return Arc::clone(snap);
        }
        let snap: Snapshot<V> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        self.snapshot = Some(Arc::clone(&snap));
        snap
    }

    /// Number of entries currently present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for Bucket<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
