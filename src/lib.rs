//! # axiom-counter
//!
//! Many workers, one integer. This crate coordinates a bounded pool of threads
//! that all increment or decrement the same counter, and shows what the guard
//! around that counter is worth.
//!
//! - [`SharedCounter`] holds the value behind the guard chosen by [`GuardMode`]
//!   (a `parking_lot` mutex, the crate's own [`SpinLock`], or nothing at all).
//! - [`Dispatcher`] feeds [`MutationJob`]s to at most `pool_size` worker
//!   threads; each repetition is one guarded `apply(±1)`.
//! - [`CompletionBarrier`] blocks the submitter until every job has reported
//!   in, so the value read afterwards is final.
//! - [`Scenario`] and [`run_scenario`] put the pieces together and compare the
//!   result with the arithmetic sum of the jobs.
//!
//! ```rust
//! use axiom_counter::{GuardMode, Scenario};
//!
//! let scenario = Scenario::alternating(4, 50_000, 4, GuardMode::Spin).unwrap();
//! let report = scenario.run().unwrap();
//! report.verify().unwrap();
//! assert_eq!(report.final_value, 0);
//! ```
//!
//! With [`GuardMode::Unguarded`] the read and the write of each update are
//! separate steps, and concurrent workers lose updates; the final value then
//! drifts away from the expected sum from one run to the next.

pub mod backoff;
pub mod barrier;
pub mod config;
pub mod counter;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod scenario;
pub mod spinlock;

pub use backoff::BackOff;
pub use barrier::{CompletionBarrier, CompletionToken};
pub use config::CoordinatorConfig;
pub use counter::{GuardMode, SharedCounter};
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::{CoordinatorError, Result};
pub use job::{Direction, MutationJob};
pub use scenario::{run_repeated, run_scenario, RunReport, Scenario};
pub use spinlock::{SpinGuard, SpinLock};
