//! # Scenario
//!
//! Ties a [`SharedCounter`], a [`Dispatcher`] and a job list into one run and
//! checks the outcome against the arithmetic sum of the jobs.
//!
//! ```rust
//! use axiom_counter::run_scenario;
//!
//! // two increment jobs, two decrement jobs, guarded
//! let value = run_scenario(4, 10_000, 8, true).unwrap();
//! assert_eq!(value, 0);
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{CoordinatorError, Result};
use crate::{Dispatcher, GuardMode, MutationJob, SharedCounter};

/// One configured run: what to submit, how wide the pool is, and how the
/// counter is guarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub jobs: Vec<MutationJob>,
    pub pool_size: usize,
    pub mode: GuardMode,
    pub timeout: Option<Duration>,
}

/// The outcome of a single [`Scenario::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub final_value: i64,
    pub expected: i64,
    pub mode: GuardMode,
    pub jobs_completed: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether the final value equals the sum of all submitted deltas.
    pub fn is_consistent(&self) -> bool {
        self.final_value == self.expected
    }

    /// An unguarded run that lost updates. Expected, not an error.
    pub fn diverged(&self) -> bool {
        !self.mode.is_guarded() && !self.is_consistent()
    }

    /// Fails with [`CoordinatorError::InvariantViolation`] when a guarded run
    /// lost or invented updates. Unguarded runs always pass.
    pub fn verify(&self) -> Result<()> {
        if self.mode.is_guarded() && !self.is_consistent() {
            return Err(CoordinatorError::InvariantViolation {
                expected: self.expected,
                actual: self.final_value,
            });
        }
        Ok(())
    }
}

impl Scenario {
    /// `job_count` jobs alternating increment and decrement, each repeated
    /// `repetitions` times.
    pub fn alternating(
        job_count: usize,
        repetitions: u64,
        pool_size: usize,
        mode: GuardMode,
    ) -> Result<Self> {
        if job_count == 0 {
            return Err(CoordinatorError::invalid("jobs", "must be at least 1"));
        }
        if pool_size == 0 {
            return Err(CoordinatorError::invalid("pool_size", "must be at least 1"));
        }
        let scenario = Scenario {
            jobs: MutationJob::alternating(job_count, repetitions),
            pool_size,
            mode,
            timeout: None,
        };
        scenario.expected_sum()?;
        Ok(scenario)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The value a correctly guarded run must end on.
    ///
    /// Fails when a job is invalid or the total does not fit in an `i64`.
    pub fn expected_sum(&self) -> Result<i64> {
        self.jobs.iter().try_fold(0i64, |sum, job| {
            job.validate()?;
            job.net_effect()
                .and_then(|effect| sum.checked_add(effect))
                .ok_or_else(|| CoordinatorError::invalid("jobs", "net effect overflows i64"))
        })
    }

    /// Runs the scenario on a fresh counter.
    ///
    /// The report is returned as-is; call [`RunReport::verify`] to turn a
    /// guarded mismatch into an error.
    pub fn run(&self) -> Result<RunReport> {
        let mut dispatcher = Dispatcher::new(self.pool_size)?;
        if let Some(limit) = self.timeout {
            dispatcher = dispatcher.with_timeout(limit);
        }

        let expected = self.expected_sum()?;
        let counter = Arc::new(SharedCounter::new(self.mode));
        let dispatch = dispatcher.run(Arc::clone(&counter), &self.jobs)?;

        let report = RunReport {
            final_value: counter.current(),
            expected,
            mode: self.mode,
            jobs_completed: dispatch.jobs_completed,
            workers: dispatch.workers,
            elapsed: dispatch.elapsed,
        };
        if report.diverged() {
            warn!(
                final_value = report.final_value,
                expected = report.expected,
                lost = report.expected.wrapping_sub(report.final_value),
                "unguarded run lost updates"
            );
        } else {
            info!(
                mode = %report.mode,
                final_value = report.final_value,
                workers = report.workers,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "run finished"
            );
        }
        Ok(report)
    }
}

/// Runs `scenario` `runs` times, stopping at the first error.
pub fn run_repeated(scenario: &Scenario, runs: usize) -> Result<Vec<RunReport>> {
    (0..runs).map(|_| scenario.run()).collect()
}

/// Runs the alternating job mix once and returns the final counter value.
///
/// `guarded = true` protects the counter with a mutex; `guarded = false`
/// selects the racy variant, whose result may differ from the expected sum.
/// A guarded run that ends on the wrong value fails with
/// [`CoordinatorError::InvariantViolation`].
pub fn run_scenario(
    job_count: usize,
    repetitions_per_job: u64,
    pool_size: usize,
    guarded: bool,
) -> Result<i64> {
    let mode = if guarded {
        GuardMode::Mutex
    } else {
        GuardMode::Unguarded
    };
    let report = Scenario::alternating(job_count, repetitions_per_job, pool_size, mode)?.run()?;
    report.verify()?;
    Ok(report.final_value)
}
