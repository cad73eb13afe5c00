//! # CompletionBarrier
//!
//! Releases the submitter once a known number of jobs have reported in.
//!
//! Workers call [`CompletionBarrier::signal`] once per finished job, usually
//! through a [`CompletionToken`] that signals when it is dropped. The submitter
//! parks in [`wait`](CompletionBarrier::wait) or
//! [`wait_timeout`](CompletionBarrier::wait_timeout) on a condition variable;
//! it never sleeps for a guessed duration and never polls.
//!
//! ```rust
//! use axiom_counter::CompletionBarrier;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let barrier = Arc::new(CompletionBarrier::new(3));
//! for _ in 0..3 {
//!     let token = barrier.token();
//!     thread::spawn(move || drop(token));
//! }
//! barrier.wait();
//! assert!(barrier.is_complete());
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::error::{CoordinatorError, Result};

pub struct CompletionBarrier {
    expected: usize,
    completed: Mutex<usize>,
    all_done: Condvar,
}

impl CompletionBarrier {
    /// A barrier that releases after `expected` signals.
    pub fn new(expected: usize) -> Self {
        CompletionBarrier {
            expected,
            completed: Mutex::new(0),
            all_done: Condvar::new(),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Signals received so far, capped at [`expected`](Self::expected).
    pub fn completed(&self) -> usize {
        *self.completed.lock()
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.expected
    }

    /// Reports one finished job.
    ///
    /// Signals beyond the expected count are ignored.
    pub fn signal(&self) {
        let mut completed = self.completed.lock();
        if *completed >= self.expected {
            warn!(expected = self.expected, "completion signalled past the expected count");
            return;
        }
        *completed += 1;
        if *completed == self.expected {
            self.all_done.notify_all();
        }
    }

    /// A token that signals this barrier exactly once, when dropped.
    pub fn token(self: &Arc<Self>) -> CompletionToken {
        CompletionToken {
            barrier: Arc::clone(self),
        }
    }

    /// Blocks until every expected signal has arrived.
    pub fn wait(&self) {
        let mut completed = self.completed.lock();
        while *completed < self.expected {
            self.all_done.wait(&mut completed);
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `limit`.
    pub fn wait_timeout(&self, limit: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started + limit;
        let mut completed = self.completed.lock();
        while *completed < self.expected {
            if self.all_done.wait_until(&mut completed, deadline).timed_out()
                && *completed < self.expected
            {
                return Err(CoordinatorError::Timeout {
                    waited: started.elapsed(),
                    completed: *completed,
                    expected: self.expected,
                });
            }
        }
        Ok(())
    }
}

/// Proof that a job is in flight. Dropping it reports the job as finished,
/// which also happens when the owning worker unwinds.
#[must_use = "dropping the token immediately reports the job as finished"]
pub struct CompletionToken {
    barrier: Arc<CompletionBarrier>,
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        self.barrier.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_wait_returns_only_after_every_signal() {
        const JOBS: usize = 16;
        let barrier = Arc::new(CompletionBarrier::new(JOBS));
        let finished = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..JOBS)
            .map(|i| {
                let token = barrier.token();
                let finished = Arc::clone(&finished);
                thread::spawn(move || {
                    // stagger the jobs so the waiter is parked for a while
                    let mut x = 0u64;
                    for k in 0..(i as u64 + 1) * 20_000 {
                        x = x.wrapping_add(k);
                    }
                    std::hint::black_box(x);
                    finished.fetch_add(1, Ordering::SeqCst);
                    drop(token);
                })
            })
            .collect();

        barrier.wait();
        assert_eq!(finished.load(Ordering::SeqCst), JOBS);
        assert_eq!(barrier.completed(), JOBS);

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_timeout_reports_progress() {
        let barrier = Arc::new(CompletionBarrier::new(3));
        barrier.signal();

        let err = barrier.wait_timeout(Duration::from_millis(20)).unwrap_err();
        match err {
            CoordinatorError::Timeout {
                completed,
                expected,
                waited,
            } => {
                assert_eq!((completed, expected), (1, 3));
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wait_timeout_succeeds_when_signalled() {
        let barrier = Arc::new(CompletionBarrier::new(2));
        let tokens = [barrier.token(), barrier.token()];
        let handle = thread::spawn(move || drop(tokens));

        barrier.wait_timeout(Duration::from_secs(10)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_panicking_worker_still_signals() {
        let barrier = Arc::new(CompletionBarrier::new(1));
        let token = barrier.token();
        let result = thread::spawn(move || {
            let _token = token;
            panic!("job failed");
        })
        .join();

        assert!(result.is_err());
        barrier.wait_timeout(Duration::from_secs(10)).unwrap();
    }

    #[test]
    fn test_extra_signals_are_capped() {
        let barrier = CompletionBarrier::new(1);
        barrier.signal();
        barrier.signal();
        assert_eq!(barrier.completed(), 1);
        barrier.wait();
    }

    #[test]
    fn test_empty_barrier_is_already_released() {
        let barrier = CompletionBarrier::new(0);
        assert!(barrier.is_complete());
        barrier.wait();
        barrier.wait_timeout(Duration::ZERO).unwrap();
    }
}
