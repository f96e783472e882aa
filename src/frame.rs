//! Frame progression and retired-frame tracking.
//!
//! The frame counter is the epoch clock for deferred destruction:
//! descriptor frees are tagged with the frame in flight at release time and
//! reclaimed once that frame is known to have retired on the device. The
//! retire fence mirrors the completion counter a graphics queue signals as
//! submitted frames finish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic frame clock shared by everything that defers work.
#[derive(Debug)]
pub struct FrameCounter {
    current: AtomicU64,
}

impl FrameCounter {
    /// New counter starting at frame 0.
    #[must_use]
    pub fn new() -> FrameCounter {
        FrameCounter {
            current: AtomicU64::new(0),
        }
    }

    /// The frame currently being recorded.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Advance to the next frame and return it.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion counter for retired frames.
///
/// The render loop signals monotonically increasing values as the device
/// reports frames complete; waiters block until the counter reaches the
/// value they care about.
#[derive(Debug)]
pub struct RetireFence {
    completed: Mutex<u64>,
    signaled: Condvar,
}

impl RetireFence {
    /// New fence with nothing completed yet.
    #[must_use]
    pub fn new() -> RetireFence {
        RetireFence {
            completed: Mutex::new(0),
            signaled: Condvar::new(),
        }
    }

    /// Record that `value` has completed.
    ///
    /// Values at or below the current counter are ignored, so out-of-order
    /// signals cannot move the fence backwards.
    pub fn signal(&self, value: u64) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if value > *completed {
            *completed = value;
            self.signaled.notify_all();
        }
    }

    /// The highest completed value observed so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        *self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `value` has completed.
    #[must_use]
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed() >= value
    }

    /// Block until `value` completes.
    pub fn wait(&self, value: u64) {
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *completed < value {
            completed = self
                .signaled
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until `value` completes or `timeout` elapses.
    ///
    /// Returns whether the value completed. Running out the clock is not an
    /// error; callers poll again or give up.
    pub fn wait_timeout(&self, value: u64, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut completed = self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *completed < value {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            let (guard, _) = self
                .signaled
                .wait_timeout(completed, timeout - elapsed)
                .unwrap_or_else(PoisonError::into_inner);
            completed = guard;
        }
        true
    }
}

impl Default for RetireFence {
    fn default() -> Self {
        Self::new()
    }
}
