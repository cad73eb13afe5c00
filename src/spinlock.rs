//! # SpinLock
//!
//! The spinning guard behind [`GuardMode::Spin`](crate::GuardMode::Spin).
//!
//! A test-and-set lock over an [`AtomicBool`]. Acquisition swaps the flag with
//! `Acquire` ordering and backs off with [`BackOff`] while it is contended;
//! dropping the [`SpinGuard`] stores `false` with `Release` ordering, which
//! publishes every write made inside the critical section to the next holder.
//!
//! The counter only ever holds this lock for one addition, which is the kind
//! of critical section a spin lock suits. It is not fair and not reentrant.
//!
//! ```rust
//! use axiom_counter::SpinLock;
//!
//! let lock = SpinLock::new(0i64);
//! lock.with_lock(|value| *value += 1);
//! assert_eq!(*lock.lock(), 1);
//! ```

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{
    AtomicBool,
    Ordering::{Acquire, Relaxed, Release},
};

use crate::BackOff;

/// Spin-based mutual exclusion around a value of type `T`.
pub struct SpinLock<T> {
    held: AtomicBool,
    value: UnsafeCell<T>,
}

/// Exclusive access to the value of a [`SpinLock`]; releases the lock on drop.
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> SpinLock<T> {
    /// Wraps `value` in an unlocked lock.
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        SpinLock {
            held: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Spins until the lock is acquired.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_, T> {
        let backoff = BackOff::new();
        while self.held.swap(true, Acquire) {
            // test-and-test-and-set: wait on a plain load before retrying the swap
            while self.held.load(Relaxed) {
                backoff.wait();
            }
        }
        SpinGuard { lock: self }
    }

    /// Acquires the lock only if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        if self.held.swap(true, Acquire) {
            None
        } else {
            Some(SpinGuard { lock: self })
        }
    }

    /// Whether some guard currently holds the lock.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.held.load(Acquire)
    }

    /// Runs `f` inside the critical section and releases the lock when it returns.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// Consumes the lock and returns the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.held.store(false, Release);
    }
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while `held` is true for this holder.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` rules out aliasing through this guard.
        unsafe { &mut *self.lock.value.get() }
    }
}

// SAFETY: access to `value` is serialized by `held`.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}
