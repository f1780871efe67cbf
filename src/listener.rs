//! Purge listener — a callback invoked once per rotation with the
//! contents of the generation being retired.
//!
//! Listeners run synchronously on the rotation thread, in registration
//! order, *without* the cache's lock held: a listener may call back into
//! `set`/`get`/`remove` on the same cache. A panicking listener is
//! swallowed and never prevents sibling listeners or the rotation itself
//! from proceeding.
//!
//! # Example
//! ```
//! use rondo::RotatingCache;
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! let cache: RotatingCache<u64> = RotatingCache::new(Duration::from_millis(50));
//! let purged = Arc::new(Mutex::new(Vec::new()));
//! let purged2 = Arc::clone(&purged);
//!
//! let id = cache.listen_purge(move |entries| {
//!     for (key, value) in entries {
//!         purged2.lock().unwrap().push((key.clone(), **value));
//!     }
//! });
//!
//! cache.set("a", 1).unwrap();
//! // ... one TTL later the listener sees [("a", 1)] ...
//! cache.unlisten_purge(id);
//! ```

use std::sync::Arc;

// ---------------------------------------------------------------------------
// ListenerId
// ---------------------------------------------------------------------------

/// Opaque token identifying one purge-listener registration.
///
/// Registering the same callback twice yields two distinct ids, and each
/// registration fires independently.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(pub(crate) u64);

// ---------------------------------------------------------------------------
// PurgeListener trait
// ---------------------------------------------------------------------------

/// A callback receiving the flattened `(key, value)` pairs of the bucket
/// being retired, in insertion order.
///
/// Implementations must be `Send + Sync + 'static`: the rotation fires on
/// a background thread and the registration is shared via `Arc`.
pub trait PurgeListener<V>: Send + Sync + 'static {
    fn on_purge(&self, entries: &[(String, Arc<V>)]);
}

/// A [`PurgeListener`] backed by a closure.
///
/// Created via [`RotatingCache::listen_purge`](crate::RotatingCache::listen_purge).
pub struct FnListener<F>(pub F);

impl<V, F> PurgeListener<V> for FnListener<F>
where
    F: Fn(&[(String, Arc<V>)]) + Send + Sync + 'static,
{
    fn on_purge(&self, entries: &[(String, Arc<V>)]) {
        (self.0)(entries)
    }
}
