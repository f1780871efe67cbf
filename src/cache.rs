use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::bucket::{Bucket, Snapshot};
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::listener::{FnListener, ListenerId, PurgeListener};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::timer::Timer;

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// The generation pair and everything the rotation mutates.
///
/// Guarded by a single mutex: all public operations are atomic from the
/// caller's perspective, and the rotation callback contends on the same
/// lock. The lock is *not* held while purge listeners run, which is what
/// allows listeners to re-enter the cache API.
struct State<V> {
    /// Current generation accepting new writes. Absent when the cache is
    /// idle (never written since the last rotation) or destroyed.
    active: Option<Bucket<V>>,
    /// Previous generation; read-only with respect to new keys, dropped
    /// on the next rotation with no successor.
    retired: Option<Bucket<V>>,
    /// The single pending rotation, if any.
    timer: Option<Timer>,
    expire_after: Duration,
    destroyed: bool,
}

/// Shared interior of a [`RotatingCache`].
pub(crate) struct Inner<V> {
    state: Mutex<State<V>>,
    /// Purge-listener registrations in registration order. A separate
    /// lock from `state` so listeners can register/unregister and mutate
    /// the cache while a rotation is notifying.
    listeners: Mutex<Vec<(ListenerId, Arc<dyn PurgeListener<V>>)>>,
    next_listener_id: AtomicU64,
    metrics: StatsCounter,
}

impl<V: Send + Sync + 'static> Inner<V> {
    /// Arms a rotation timer for `delay`.
    ///
    /// The callback holds only a `Weak` reference, so an armed timer never
    /// keeps a dropped cache alive.
    fn arm(inner: &Arc<Inner<V>>, state: &mut State<V>, delay: Duration) {
        trace!(?delay, "arming rotation timer");
        let weak: Weak<Inner<V>> = Arc::downgrade(inner);
        state.timer = Some(Timer::new(
            move || {
                if let Some(inner) = weak.upgrade() {
                    Inner::rotate(&inner);
                }
            },
            delay,
        ));
    }

    /// Arms a timer for the configured TTL unless one is already pending.
    fn arm_if_idle(inner: &Arc<Inner<V>>, state: &mut State<V>) {
        if state.timer.is_none() {
            let delay = state.expire_after;
            Inner::arm(inner, state, delay);
        }
    }

    /// The rotation: fired by the timer on its own thread.
    ///
    /// Runs in three phases — capture the notification snapshot under the
    /// lock, notify listeners without the lock, then re-acquire the lock
    /// and apply the structural transition based on *current* state
    /// (listeners may have materialized a fresh active bucket, which must
    /// be demoted and re-armed like any other).
    fn rotate(inner: &Arc<Inner<V>>) {
        let snapshot: Snapshot<V> = {
            let mut state = inner.state.lock();
            // Forget the stored timer only if it is the one that just
            // fired; change_expire_after may have replaced it while this
            // callback was waiting on the lock.
            if state.timer.as_ref().is_some_and(|t| t.has_fired()) {
                state.timer = None;
            }
            if state.destroyed {
                return;
            }
            if let Some(active) = state.active.as_mut() {
                active.to_array()
            } else if let Some(retired) = state.retired.as_mut() {
                retired.to_array()
            } else {
                Arc::from(Vec::new())
            }
        };

        // Registration order; each listener isolated from the others.
        let listeners = inner.listeners.lock().clone();
        for (id, listener) in &listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_purge(&snapshot)));
            if outcome.is_err() {
                warn!(listener = id.0, "purge listener panicked; continuing rotation");
            }
        }

        let mut state = inner.state.lock();
        if state.destroyed {
            return;
        }
        inner.metrics.record_rotation();
        if let Some(dropped) = state.retired.take() {
            inner.metrics.record_purged(dropped.len() as u64);
        }
        if state.active.is_some() {
            state.retired = state.active.take();
            // A listener's set may already have armed the next rotation.
            Inner::arm_if_idle(inner, &mut state);
            debug!(
                retired = state.retired.as_ref().map_or(0, |b| b.len()),
                "rotated generations"
            );
        } else {
            // No live traffic for a full cycle: go idle until the next set.
            debug!("no active generation; cache is now idle");
        }
    }
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// An in-process key/value cache that expires entries by rotating two
/// bucket generations instead of tracking per-entry deadlines.
///
/// Every entry is guaranteed to live at least `expire_after` and at most
/// `2 × expire_after`: a write lands in the active generation, survives
/// one rotation as the retired generation, and is dropped by the next.
/// Rotation runs only while there is live traffic; an idle cache holds no
/// buckets and no timer.
///
/// Keys of any [`Display`](std::fmt::Display) type share one string key
/// space — see [`CacheKey`] for the collision semantics.
///
/// # Example
/// ```
/// use rondo::RotatingCache;
/// use std::time::Duration;
///
/// let cache: RotatingCache<&'static str> = RotatingCache::new(Duration::from_secs(60));
/// cache.set("greeting", "hello").unwrap();
/// assert_eq!(*cache.get("greeting").unwrap(), "hello");
/// assert!(cache.has("greeting"));
/// ```
pub struct RotatingCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for RotatingCache<V> {
    fn clone(&self) -> Self {
        RotatingCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + Sync + 'static> RotatingCache<V> {
    /// Creates a cache whose entries expire between `expire_after` and
    /// `2 × expire_after` after being written.
    pub fn new(expire_after: Duration) -> Self {
        RotatingCache {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    active: None,
                    retired: None,
                    timer: None,
                    expire_after,
                    destroyed: false,
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                metrics: StatsCounter::new(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Hot-path: set / get / has / remove
    // -----------------------------------------------------------------------

    /// Writes `value` under `key`'s canonical form, overwriting any entry
    /// with the same canonical key in the active generation.
    ///
    /// Lazily creates the active generation and, if the cache was idle,
    /// arms the rotation timer.
    ///
    /// # Errors
    /// [`CacheError::Destroyed`] if [`destroy`](Self::destroy) was called.
    pub fn set<K: CacheKey + ?Sized>(&self, key: &K, value: V) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.destroyed {
            return Err(CacheError::Destroyed);
        }
        if state.active.is_none() {
            state.active = Some(Bucket::new());
            Inner::arm_if_idle(&self.inner, &mut state);
        }
        if let Some(active) = state.active.as_mut() {
            active.set(key, value);
        }
        Ok(())
    }

    /// Returns the value for `key` from the active generation, falling
    /// back to the retired one.
    ///
    /// # Errors
    /// [`CacheError::NotFound`] if the key is absent from both
    /// generations (including after `destroy`, which drops them).
    pub fn get<K: CacheKey + ?Sized>(&self, key: &K) -> Result<Arc<V>> {
        let state = self.inner.state.lock();
        let hit = state
            .active
            .as_ref()
            .and_then(|b| b.get(key).ok())
            .or_else(|| state.retired.as_ref().and_then(|b| b.get(key).ok()));
        match hit {
            Some(value) => {
                self.inner.metrics.record_hit();
                Ok(value)
            }
            None => {
                self.inner.metrics.record_miss();
                Err(CacheError::NotFound)
            }
        }
    }

    /// Returns `true` if either generation holds the key. Never fails,
    /// including on a destroyed cache.
    pub fn has<K: CacheKey + ?Sized>(&self, key: &K) -> bool {
        let state = self.inner.state.lock();
        state.active.as_ref().is_some_and(|b| b.has(key))
            || state.retired.as_ref().is_some_and(|b| b.has(key))
    }

    /// Removes the key from whichever generations hold it. Never fails,
    /// even when destroyed or when the key never existed.
    pub fn remove<K: CacheKey + ?Sized>(&self, key: &K) {
        let mut state = self.inner.state.lock();
        if let Some(active) = state.active.as_mut() {
            active.remove(key);
        }
        if let Some(retired) = state.retired.as_mut() {
            retired.remove(key);
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Permanently shuts the cache down: clears the pending rotation,
    /// releases both generations, and forbids future `set` /
    /// `change_expire_after` calls. Idempotent.
    ///
    /// Listener registrations are retained; they simply never fire again
    /// because no rotation can.
    pub fn destroy(&self) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.clear();
        }
        state.active = None;
        state.retired = None;
        state.destroyed = true;
        debug!("cache destroyed");
    }

    /// Changes the TTL used for subsequently armed rotations.
    ///
    /// Shrinking the TTL while a rotation is pending reschedules it to
    /// `max(0, new_ttl − elapsed)`, so a speed-up is observed
    /// immediately. Growing it (or changing it while idle) leaves the
    /// in-flight schedule untouched: slowing down is not retroactive.
    ///
    /// # Errors
    /// [`CacheError::Destroyed`] if [`destroy`](Self::destroy) was called.
    pub fn change_expire_after(&self, expire_after: Duration) -> Result<()> {
        let mut state = self.inner.state.lock();
        if state.destroyed {
            return Err(CacheError::Destroyed);
        }
        let previous = state.expire_after;
        state.expire_after = expire_after;

        if expire_after < previous {
            if let Some(old) = state.timer.take() {
                let remaining = expire_after.saturating_sub(old.elapsed());
                old.clear();
                Inner::arm(&self.inner, &mut state, remaining);
            }
        }
        Ok(())
    }

    /// The TTL currently used when arming rotations.
    pub fn expire_after(&self) -> Duration {
        self.inner.state.lock().expire_after
    }

    // -----------------------------------------------------------------------
    // Purge listeners
    // -----------------------------------------------------------------------

    /// Registers a closure invoked once per rotation with the flattened
    /// contents of the generation being retired, in insertion order.
    ///
    /// Listeners run on the rotation thread in registration order, and
    /// may call back into this cache (including `set`, which can
    /// materialize a fresh active generation mid-rotation). Registering
    /// the same closure twice yields two independent registrations.
    pub fn listen_purge<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&[(String, Arc<V>)]) + Send + Sync + 'static,
    {
        self.listen_purge_impl(FnListener(f))
    }

    /// Registers a listener via the [`PurgeListener`] trait.
    pub fn listen_purge_impl<L: PurgeListener<V>>(&self, listener: L) -> ListenerId {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn PurgeListener<V>> = Arc::new(listener);
        self.inner.listeners.lock().push((id, listener));
        id
    }

    /// Removes one registration by id; unknown ids are a silent no-op.
    pub fn unlisten_purge(&self, id: ListenerId) {
        self.inner.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Metrics {
        self.inner.metrics.snapshot()
    }
}
