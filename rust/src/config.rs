//! Configuration types for the scheduler.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::logging::VERBOSITY_SILENT;

/// Errors raised while parsing configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid percentage value of '{0}', value cannot be less than '0%' or more than '100%'")]
    InvalidPercentage(String),
    #[error("Invalid parallelism value of '{0}', expected a number, a percentage, or 'max'")]
    InvalidParallelism(String),
    #[error("Unknown failure policy: {0}")]
    UnknownFailurePolicy(String),
}

/// How many operations may run at once.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Parallelism {
    /// One slot per core, leaving one core free on Windows.
    #[default]
    Default,
    /// One slot per core.
    Max,
    /// A percentage of the cores (0 < pct <= 100), rounded down, at least
    /// one slot.
    Percent(f64),
    /// A fixed number of slots (values below 1 are treated as 1).
    Fixed(usize),
}

impl Parallelism {
    /// Resolve to a slot count for a machine with `cores` cores.
    pub fn resolve(self, cores: usize) -> usize {
        let cores = cores.max(1);
        match self {
            Self::Default => {
                if cfg!(windows) {
                    cores.saturating_sub(1).max(1)
                } else {
                    cores
                }
            }
            Self::Max => cores,
            Self::Percent(pct) => ((pct / 100.0 * cores as f64).floor() as usize).max(1),
            Self::Fixed(n) => n.max(1),
        }
    }

    /// Resolve against the cores available to this process.
    pub fn resolve_for_host(self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.resolve(cores)
    }
}

impl FromStr for Parallelism {
    type Err = ConfigError;

    /// Accepts `max`, a percentage such as `50%`, or a plain number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "max" {
            return Ok(Self::Max);
        }

        if let Some(pct) = trimmed.strip_suffix('%') {
            let value: f64 = pct
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPercentage(s.to_string()))?;
            if value <= 0.0 || value > 100.0 {
                return Err(ConfigError::InvalidPercentage(s.to_string()));
            }
            return Ok(Self::Percent(value));
        }

        trimmed
            .parse::<usize>()
            .map(Self::Fixed)
            .map_err(|_| ConfigError::InvalidParallelism(s.to_string()))
    }
}

/// What happens to the rest of the run when an operation fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Skip the failed operation's dependents and stop starting new work;
    /// operations already running are allowed to finish.
    FailFast,
    /// Skip only the failed operation's dependents; unrelated branches
    /// continue to completion.
    #[default]
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail-fast" | "fail_fast" => Ok(Self::FailFast),
            "continue" => Ok(Self::Continue),
            other => Err(ConfigError::UnknownFailurePolicy(other.to_string())),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// Configuration for one scheduler run.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of simultaneously running operations.
    pub parallelism: Parallelism,
    /// Failure handling mode.
    pub failure_policy: FailurePolicy,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::Default,
            failure_policy: FailurePolicy::Continue,
            verbosity: VERBOSITY_SILENT,
        }
    }
}

impl SchedulerConfig {
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Slot count for a graph of `operation_count` operations on this host.
    ///
    /// Never exceeds the number of operations, and is at least 1.
    pub fn concurrency_limit(&self, operation_count: usize) -> usize {
        self.parallelism
            .resolve_for_host()
            .min(operation_count)
            .max(1)
    }
}
