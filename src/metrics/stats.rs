use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated on every cache operation.
pub struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    rotations: AtomicU64,
    purged: AtomicU64,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            purged: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_purged(&self, count: u64) {
        self.purged.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> Metrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let rotations = self.rotations.load(Ordering::Relaxed);
        let purged = self.purged.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0_f64
        } else {
            hits as f64 / total as f64
        };
        Metrics {
            hits,
            misses,
            rotations,
            purged,
            hit_rate,
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Number of cache hits (key found in either generation).
    pub hits: u64,
    /// Number of cache misses (key absent from both generations).
    pub misses: u64,
    /// Number of generation rotations fired by the timer.
    pub rotations: u64,
    /// Number of entries dropped when their retired generation was purged.
    pub purged: u64,
    /// `hits / (hits + misses)`, or `0.0` if no lookups have been made.
    pub hit_rate: f64,
}

impl Metrics {
    pub fn request_count(&self) -> u64 {
        self.hits + self.misses
    }
}
