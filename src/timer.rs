//! A cancellable one-shot delayed callback.
//!
//! Arming spawns a detached background thread that parks on a condvar
//! until the deadline passes or the timer is cleared. A detached thread
//! never keeps the process alive past `main`, so an armed timer behaves
//! like daemon-style scheduling rather than a blocking wait.
//!
//! The timer also records its arm instant: [`Timer::elapsed`] is valid
//! at any point in its life, including after the callback has run, which
//! is what allows a pending schedule to be shortened mid-flight.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum TimerState {
    Armed,
    Cleared,
    Fired,
}

struct Shared {
    state: Mutex<TimerState>,
    cond: Condvar,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A one-shot timer, armed on construction.
///
/// The callback runs exactly once, on the timer's own thread, unless the
/// timer is cleared (or dropped) before the deadline. The state handoff
/// happens under the timer's lock, so a `clear` that loses the race with
/// the deadline observes `Fired` and becomes a no-op.
pub struct Timer {
    start: Instant,
    shared: Arc<Shared>,
}

impl Timer {
    /// Arms `callback` to fire once after `delay`.
    pub fn new<F>(callback: F, delay: Duration) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let start = Instant::now();
        let deadline = start + delay;
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState::Armed),
            cond: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        thread::spawn(move || {
            let mut state = worker.state.lock();
            // Loop guards against spurious wakeups.
            while *state == TimerState::Armed {
                if worker.cond.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            if *state != TimerState::Armed {
                return; // cleared before the deadline
            }
            *state = TimerState::Fired;
            drop(state);
            callback();
        });

        Timer { start, shared }
    }

    /// Wall-clock time since the timer was armed.
    ///
    /// Valid before and after firing.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Disarms the pending callback if it has not fired yet.
    ///
    /// Idempotent: clearing twice, or clearing after the callback ran,
    /// is a no-op.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        if *state == TimerState::Armed {
            *state = TimerState::Cleared;
            self.shared.cond.notify_one();
        }
    }

    /// Returns `true` once the callback has been handed off for delivery.
    ///
    /// Lets an owner holding several timer generations tell a timer that
    /// just fired apart from one re-armed while the callback was still
    /// waiting to run.
    pub fn has_fired(&self) -> bool {
        *self.shared.state.lock() == TimerState::Fired
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
