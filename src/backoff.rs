//! # BackOff
//!
//! Exponential backoff for the spin guard.
//!
//! When a worker finds the [`SpinLock`](crate::SpinLock) already held it calls
//! [`BackOff::wait`] before retrying. Every call spins a little longer than the
//! previous one (doubling up to a ceiling), and once contention has lasted past
//! a threshold the thread also yields to the scheduler so that the holder of
//! the lock gets CPU time to finish its critical section.
//!
//! ```rust
//! use axiom_counter::BackOff;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! let flag = AtomicBool::new(false);
//! let backoff = BackOff::new();
//!
//! while flag.swap(true, Ordering::Acquire) {
//!     backoff.wait();
//! }
//! assert!(flag.load(Ordering::Relaxed));
//! ```

use core::{cell::Cell, hint::spin_loop};

/// Ceiling on the spin iterations of a single [`BackOff::wait`].
const MAX_SPIN: u32 = 1 << 16;

/// Spin iterations of the first wait.
const START_SPIN: u32 = 1 << 4;

/// Past this many spins every wait also yields the thread.
const YIELD_THRESHOLD: u32 = 1 << 10;

/// Per-acquisition backoff state.
///
/// A `BackOff` lives on the stack of a single lock attempt, so it uses a plain
/// [`Cell`] and is deliberately not `Sync`.
pub struct BackOff {
    spin: Cell<u32>,
}

impl BackOff {
    /// Starts a fresh backoff sequence.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            spin: Cell::new(START_SPIN),
        }
    }

    /// Spins for the current step, then doubles the next step.
    ///
    /// Yields the thread when the step that just ran exceeded the yield
    /// threshold.
    #[inline]
    pub fn wait(&self) {
        let steps = self.spin.get();

        for _ in 0..steps {
            spin_loop();
        }

        self.spin.set(steps.saturating_mul(2).min(MAX_SPIN));

        if steps > YIELD_THRESHOLD {
            std::thread::yield_now();
        }
    }

    /// Spin iterations the next [`wait`](BackOff::wait) will perform.
    #[inline(always)]
    pub fn current(&self) -> u32 {
        self.spin.get()
    }

    /// Restarts the sequence from the first step.
    #[inline(always)]
    pub fn reset(&self) {
        self.spin.set(START_SPIN);
    }
}

impl Default for BackOff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_double_until_ceiling() {
        let b = BackOff::new();
        assert_eq!(b.current(), START_SPIN);

        b.wait();
        assert_eq!(b.current(), START_SPIN * 2);

        for _ in 0..32 {
            b.wait();
        }
        assert_eq!(b.current(), MAX_SPIN, "Backoff should saturate at MAX_SPIN");
    }

    #[test]
    fn test_reset_behavior() {
        let b = BackOff::new();

        for _ in 0..5 {
            b.wait();
        }
        assert!(b.current() > START_SPIN);

        b.reset();
        assert_eq!(b.current(), START_SPIN, "Reset did not restore the first step");
    }
}
