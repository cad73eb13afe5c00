//! Command-line driver for the counter coordinator.
//!
//! Runs the increment/decrement scenario one or more times and prints the
//! final counter value of each run next to the value it should have reached.
//!
//! ```text
//! axiom-counter --jobs 4 --repetitions 1000000 --pool-size 50 --mode unguarded --runs 5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axiom_counter::{run_repeated, CoordinatorConfig, GuardMode};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "axiom-counter", version, about = "Concurrent shared-counter scenarios")]
struct Args {
    /// TOML scenario file; flags given on the command line take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of jobs, alternating increment and decrement
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Repetitions per job
    #[arg(short, long)]
    repetitions: Option<u64>,

    /// Maximum number of concurrently running workers
    #[arg(short, long)]
    pool_size: Option<usize>,

    /// Guard around the counter: mutex, spin or unguarded
    #[arg(short, long)]
    mode: Option<GuardMode>,

    /// Give up waiting for the workers after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How many times to run the scenario
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,
}

impl Args {
    fn into_config(self) -> Result<(CoordinatorConfig, usize)> {
        let mut config = match &self.config {
            Some(path) => CoordinatorConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CoordinatorConfig::default(),
        };
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
            config.job_list.clear();
        }
        if let Some(repetitions) = self.repetitions {
            config.repetitions = repetitions;
            config.job_list.clear();
        }
        if let Some(pool_size) = self.pool_size {
            config.pool_size = pool_size;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        Ok((config, self.runs as usize))
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let (config, runs) = Args::parse().into_config()?;
    let scenario = config.into_scenario().context("invalid scenario")?;

    println!(
        "Running {} jobs on a pool of {} ({} mode), {} run(s)...",
        scenario.jobs.len(),
        scenario.pool_size,
        scenario.mode,
        runs
    );

    let reports = run_repeated(&scenario, runs)?;
    for (i, report) in reports.iter().enumerate() {
        let note = if report.diverged() {
            "  <- lost updates"
        } else {
            ""
        };
        println!(
            "run {:>3}: final counter value {} (expected {}) in {:?}{}",
            i + 1,
            report.final_value,
            report.expected,
            round_ms(report.elapsed),
            note
        );
        report.verify()?;
    }

    let diverged = reports.iter().filter(|r| r.diverged()).count();
    if !scenario.mode.is_guarded() {
        println!("{diverged} of {runs} unguarded run(s) diverged from the expected sum");
    }
    Ok(())
}

fn round_ms(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
