//! Units of work handed to the pool.

use core::fmt;

use serde::Deserialize;

use crate::error::{CoordinatorError, Result};

/// Which way a job moves the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increment,
    Decrement,
}

impl Direction {
    /// The delta applied per repetition.
    #[inline(always)]
    pub const fn delta(self) -> i64 {
        match self {
            Direction::Increment => 1,
            Direction::Decrement => -1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Increment => "increment",
            Direction::Decrement => "decrement",
        })
    }
}

/// A direction and how many times to apply it. Consumed by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MutationJob {
    pub direction: Direction,
    pub repetitions: u64,
}

impl MutationJob {
    /// Largest repetition count whose net effect still fits the counter.
    pub const MAX_REPETITIONS: u64 = i64::MAX as u64;

    pub const fn new(direction: Direction, repetitions: u64) -> Self {
        MutationJob {
            direction,
            repetitions,
        }
    }

    pub const fn increment(repetitions: u64) -> Self {
        Self::new(Direction::Increment, repetitions)
    }

    pub const fn decrement(repetitions: u64) -> Self {
        Self::new(Direction::Decrement, repetitions)
    }

    /// What this job adds to the counter once it has run to completion, or
    /// `None` when that does not fit in an `i64`.
    pub fn net_effect(&self) -> Option<i64> {
        i64::try_from(self.repetitions)
            .ok()?
            .checked_mul(self.direction.delta())
    }

    /// Rejects jobs with no repetitions or more than [`Self::MAX_REPETITIONS`].
    pub fn validate(&self) -> Result<()> {
        if self.repetitions == 0 {
            return Err(CoordinatorError::invalid(
                "repetitions",
                format!("{} job has no repetitions", self.direction),
            ));
        }
        if self.repetitions > Self::MAX_REPETITIONS {
            return Err(CoordinatorError::invalid(
                "repetitions",
                format!(
                    "{} job repeats {} times, more than the maximum of {}",
                    self.direction,
                    self.repetitions,
                    Self::MAX_REPETITIONS
                ),
            ));
        }
        Ok(())
    }

    /// `job_count` jobs alternating increment, decrement, increment, ...
    pub fn alternating(job_count: usize, repetitions: u64) -> Vec<MutationJob> {
        (0..job_count)
            .map(|i| {
                if i % 2 == 0 {
                    Self::increment(repetitions)
                } else {
                    Self::decrement(repetitions)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternating_mix() {
        let jobs = MutationJob::alternating(4, 10);
        let dirs: Vec<_> = jobs.iter().map(|j| j.direction).collect();
        assert_eq!(
            dirs,
            [
                Direction::Increment,
                Direction::Decrement,
                Direction::Increment,
                Direction::Decrement
            ]
        );
        assert_eq!(jobs.iter().filter_map(MutationJob::net_effect).sum::<i64>(), 0);
    }

    #[test]
    fn test_odd_count_leans_positive() {
        let jobs = MutationJob::alternating(3, 5);
        assert_eq!(jobs.iter().filter_map(MutationJob::net_effect).sum::<i64>(), 5);
        assert_eq!(MutationJob::decrement(4).net_effect(), Some(-4));
    }

    #[test]
    fn test_repetitions_beyond_i64_are_rejected() {
        let too_many = MutationJob::increment(u64::MAX);
        assert_eq!(too_many.net_effect(), None);
        assert!(matches!(
            too_many.validate(),
            Err(CoordinatorError::InvalidParameter { name: "repetitions", .. })
        ));

        let widest = MutationJob::decrement(MutationJob::MAX_REPETITIONS);
        widest.validate().unwrap();
        assert_eq!(widest.net_effect(), Some(-i64::MAX));

        assert!(MutationJob::increment(MutationJob::MAX_REPETITIONS + 1).validate().is_err());
        assert!(MutationJob::increment(0).validate().is_err());
    }
}
