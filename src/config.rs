//! Scenario configuration files.
//!
//! ```toml
//! jobs = 4
//! repetitions = 1000000
//! pool_size = 50
//! mode = "spin"
//! timeout_ms = 30000
//!
//! # optional; replaces the alternating mix built from `jobs`/`repetitions`
//! [[job]]
//! direction = "increment"
//! repetitions = 500
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CoordinatorError, Result};
use crate::{GuardMode, MutationJob, Scenario};

pub const DEFAULT_JOBS: usize = 4;
pub const DEFAULT_REPETITIONS: u64 = 1_000_000;
pub const DEFAULT_POOL_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    pub jobs: usize,
    pub repetitions: u64,
    pub pool_size: usize,
    pub mode: GuardMode,
    pub timeout_ms: Option<u64>,
    #[serde(rename = "job")]
    pub job_list: Vec<MutationJob>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            jobs: DEFAULT_JOBS,
            repetitions: DEFAULT_REPETITIONS,
            pool_size: DEFAULT_POOL_SIZE,
            mode: GuardMode::default(),
            timeout_ms: None,
            job_list: Vec::new(),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: CoordinatorConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(CoordinatorError::invalid("pool_size", "must be at least 1"));
        }
        if self.timeout_ms == Some(0) {
            return Err(CoordinatorError::invalid("timeout_ms", "must be positive when set"));
        }
        if self.job_list.is_empty() {
            if self.jobs == 0 {
                return Err(CoordinatorError::invalid("jobs", "must be at least 1"));
            }
            MutationJob::increment(self.repetitions).validate()?;
        } else {
            for job in &self.job_list {
                job.validate()?;
            }
        }
        Ok(())
    }

    pub fn into_scenario(self) -> Result<Scenario> {
        self.validate()?;
        let mut scenario = if self.job_list.is_empty() {
            Scenario::alternating(self.jobs, self.repetitions, self.pool_size, self.mode)?
        } else {
            Scenario {
                jobs: self.job_list,
                pool_size: self.pool_size,
                mode: self.mode,
                timeout: None,
            }
        };
        if let Some(ms) = self.timeout_ms {
            scenario = scenario.with_timeout(Duration::from_millis(ms));
        }
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = CoordinatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoordinatorConfig::default());

        let scenario = config.into_scenario().unwrap();
        assert_eq!(scenario.jobs.len(), DEFAULT_JOBS);
        assert_eq!(scenario.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(scenario.mode, GuardMode::Mutex);
        assert_eq!(scenario.expected_sum().unwrap(), 0);
    }

    #[test]
    fn test_explicit_job_list_overrides_mix() {
        let config = CoordinatorConfig::from_toml_str(
            r#"
            pool_size = 2
            mode = "unguarded"
            timeout_ms = 1500

            [[job]]
            direction = "increment"
            repetitions = 10

            [[job]]
            direction = "decrement"
            repetitions = 3
            "#,
        )
        .unwrap();

        let scenario = config.into_scenario().unwrap();
        assert_eq!(scenario.jobs[1].direction, Direction::Decrement);
        assert_eq!(scenario.expected_sum().unwrap(), 7);
        assert_eq!(scenario.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(scenario.mode, GuardMode::Unguarded);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            CoordinatorConfig::from_toml_str("pool_size = 0"),
            Err(CoordinatorError::InvalidParameter { name: "pool_size", .. })
        ));
        // TOML integers stop at i64::MAX, so the parser rejects this one
        assert!(CoordinatorConfig::from_toml_str("repetitions = 9223372036854775808").is_err());
        let oversized = CoordinatorConfig {
            repetitions: u64::MAX,
            ..CoordinatorConfig::default()
        };
        assert!(matches!(
            oversized.validate(),
            Err(CoordinatorError::InvalidParameter { name: "repetitions", .. })
        ));
        assert!(matches!(
            CoordinatorConfig::from_toml_str("[[job]]\ndirection = \"decrement\"\nrepetitions = 0\n"),
            Err(CoordinatorError::InvalidParameter { name: "repetitions", .. })
        ));
        assert!(matches!(
            CoordinatorConfig::from_toml_str("mode = \"atomic\""),
            Err(CoordinatorError::Config(_))
        ));
        assert!(matches!(
            CoordinatorConfig::from_toml_str("threads = 4"),
            Err(CoordinatorError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("axiom-counter-{}.toml", std::process::id()));
        fs::write(&path, "jobs = 2\nrepetitions = 5\nmode = \"spin\"\n").unwrap();

        let config = CoordinatorConfig::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.jobs, 2);
        assert_eq!(config.mode, GuardMode::Spin);
        assert!(matches!(
            CoordinatorConfig::load(&path),
            Err(CoordinatorError::Io(_))
        ));
    }
}
