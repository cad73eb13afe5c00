//! # SharedCounter
//!
//! The single piece of shared mutable state of a run, together with the guard
//! that protects it.
//!
//! A [`SharedCounter`] is created by the caller and handed to the dispatcher
//! behind an [`Arc`](std::sync::Arc); there is no global instance. Its
//! [`GuardMode`] decides how [`SharedCounter::apply`] serializes the
//! read-modify-write:
//!
//! - [`GuardMode::Mutex`] blocks on a `parking_lot` mutex,
//! - [`GuardMode::Spin`] spins on a [`SpinLock`],
//! - [`GuardMode::Unguarded`] performs the read and the write as two separate
//!   steps. Concurrent callers can both read the same old value and one of the
//!   updates is lost. This is the race the guarded modes exist to prevent.

use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::CoordinatorError;
use crate::SpinLock;

/// How the counter serializes concurrent updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardMode {
    /// Blocking mutex; the waiting thread sleeps in the kernel.
    #[default]
    Mutex,
    /// Spin lock with exponential backoff.
    Spin,
    /// No guard at all. Loses updates under contention.
    Unguarded,
}

impl GuardMode {
    pub fn is_guarded(self) -> bool {
        !matches!(self, GuardMode::Unguarded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GuardMode::Mutex => "mutex",
            GuardMode::Spin => "spin",
            GuardMode::Unguarded => "unguarded",
        }
    }
}

impl fmt::Display for GuardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuardMode {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mutex" => Ok(GuardMode::Mutex),
            "spin" => Ok(GuardMode::Spin),
            "unguarded" => Ok(GuardMode::Unguarded),
            other => Err(CoordinatorError::invalid(
                "mode",
                format!("`{other}` is not one of mutex, spin, unguarded"),
            )),
        }
    }
}

enum Slot {
    Mutex(Mutex<i64>),
    Spin(SpinLock<i64>),
    Unguarded(AtomicI64),
}

/// An integer shared by every worker of a run.
pub struct SharedCounter {
    slot: Slot,
}

impl SharedCounter {
    pub fn new(mode: GuardMode) -> Self {
        Self::with_initial(mode, 0)
    }

    pub fn with_initial(mode: GuardMode, value: i64) -> Self {
        let slot = match mode {
            GuardMode::Mutex => Slot::Mutex(Mutex::new(value)),
            GuardMode::Spin => Slot::Spin(SpinLock::new(value)),
            GuardMode::Unguarded => Slot::Unguarded(AtomicI64::new(value)),
        };
        SharedCounter { slot }
    }

    pub fn mode(&self) -> GuardMode {
        match self.slot {
            Slot::Mutex(_) => GuardMode::Mutex,
            Slot::Spin(_) => GuardMode::Spin,
            Slot::Unguarded(_) => GuardMode::Unguarded,
        }
    }

    /// Returns the value at the moment of the call.
    ///
    /// While workers are still running this is an accurate snapshot, not the
    /// result of the run. Only a read taken after the
    /// [`CompletionBarrier`](crate::CompletionBarrier) has released is final.
    pub fn current(&self) -> i64 {
        match &self.slot {
            Slot::Mutex(m) => *m.lock(),
            Slot::Spin(s) => *s.lock(),
            Slot::Unguarded(a) => a.load(Ordering::Relaxed),
        }
    }

    /// Adds `delta` to the value.
    ///
    /// In the guarded modes the whole read-modify-write happens under one
    /// acquisition of the guard, which is released before returning.
    #[inline]
    pub fn apply(&self, delta: i64) {
        match &self.slot {
            Slot::Mutex(m) => *m.lock() += delta,
            Slot::Spin(s) => s.with_lock(|v| *v += delta),
            Slot::Unguarded(a) => {
                // two independent steps: another worker may store in between
                let seen = a.load(Ordering::Relaxed);
                a.store(seen + delta, Ordering::Relaxed);
            }
        }
    }
}

impl fmt::Debug for SharedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCounter")
            .field("mode", &self.mode())
            .field("value", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn hammer(counter: &Arc<SharedCounter>, threads: usize, reps: usize) {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let counter = Arc::clone(counter);
                let delta = if i % 2 == 0 { 3 } else { -1 };
                thread::spawn(move || {
                    for _ in 0..reps {
                        counter.apply(delta);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_apply_and_current_single_thread() {
        for mode in [GuardMode::Mutex, GuardMode::Spin, GuardMode::Unguarded] {
            let counter = SharedCounter::with_initial(mode, 7);
            counter.apply(5);
            counter.apply(-20);
            assert_eq!(counter.current(), -8, "mode {mode}");
            assert_eq!(counter.mode(), mode);
        }
    }

    #[test]
    fn test_guarded_modes_keep_every_update() {
        for mode in [GuardMode::Mutex, GuardMode::Spin] {
            let counter = Arc::new(SharedCounter::new(mode));
            hammer(&counter, 6, 20_000);
            // three threads add 3, three subtract 1
            assert_eq!(counter.current(), 3 * 20_000 * 3 - 3 * 20_000, "mode {mode}");
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Spin".parse::<GuardMode>().unwrap(), GuardMode::Spin);
        assert_eq!("mutex".parse::<GuardMode>().unwrap(), GuardMode::Mutex);
        assert!(!"unguarded".parse::<GuardMode>().unwrap().is_guarded());
        assert!(matches!(
            "atomic".parse::<GuardMode>(),
            Err(CoordinatorError::InvalidParameter { name: "mode", .. })
        ));
    }
}
