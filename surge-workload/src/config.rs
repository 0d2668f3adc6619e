//! Benchmark configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use surge_core::RecordTemplate;
use surge_flow::{FlowError, RatePatternConfig};

/// Default closed-loop delay between operations, in milliseconds.
pub const THINK_TIME_MS_DEFAULT: u64 = 10;

/// Upper bound on warm-up plus measured duration, in seconds (one week).
pub const MAX_RUN_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Errors raised while loading or validating a benchmark configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds an invalid value.
    #[error("invalid {field}: {reason}")]
    InvalidConfig {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The rate pattern is invalid.
    #[error("invalid rate pattern: {0}")]
    Flow(#[from] FlowError),

    /// I/O error reading a profile file.
    #[error("failed to read profile from {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Parse error in TOML.
    #[error("failed to parse profile: {message}")]
    Parse {
        /// Error message.
        message: String,
    },

    /// Profile not found.
    #[error("profile not found: {name}")]
    NotFound {
        /// Profile name.
        name: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// How the executor issues operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Operations fire at a target rate regardless of completions.
    #[default]
    OpenLoop,
    /// A fixed pool of workers each issue one operation at a time.
    ClosedLoop,
}

impl ExecutionMode {
    /// Returns the mode name as written in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenLoop => "open-loop",
            Self::ClosedLoop => "closed-loop",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open-loop" => Ok(Self::OpenLoop),
            "closed-loop" => Ok(Self::ClosedLoop),
            other => Err(ConfigError::invalid(
                "mode",
                format!("expected open-loop or closed-loop, got {other:?}"),
            )),
        }
    }
}

/// Configuration for one benchmark run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Measured duration in seconds, after warm-up.
    pub duration_secs: f64,
    /// Warm-up duration in seconds. Operations in this window run but are not reported.
    pub warmup_secs: f64,
    /// Number of workers. In open-loop mode this only labels results.
    pub concurrency: u32,
    /// Fraction of operations that are writes. Reads are the complement.
    pub write_ratio: f64,
    /// Dispatch model.
    pub mode: ExecutionMode,
    /// Target rate for open-loop mode when the rate pattern is disabled.
    pub requests_per_second: u64,
    /// Time-varying rate schedule for open-loop mode.
    pub rate_pattern: RatePatternConfig,
    /// Closed-loop delay between operations in milliseconds. 0 disables it.
    pub think_time_ms: u64,
    /// Seed for per-worker random streams. Random when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Record template pool. Empty means the built-in defaults.
    pub templates: Vec<RecordTemplate>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            warmup_secs: 5.0,
            concurrency: 10,
            write_ratio: 0.5,
            mode: ExecutionMode::OpenLoop,
            requests_per_second: 100,
            rate_pattern: RatePatternConfig::disabled(),
            think_time_ms: THINK_TIME_MS_DEFAULT,
            seed: None,
            templates: Vec::new(),
        }
    }
}

impl BenchmarkConfig {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder::default()
    }

    /// Returns the warm-up window. Out-of-range values saturate.
    #[must_use]
    pub fn warmup(&self) -> Duration {
        secs_to_duration(self.warmup_secs)
    }

    /// Returns the measured duration. Out-of-range values saturate.
    #[must_use]
    pub fn duration(&self) -> Duration {
        secs_to_duration(self.duration_secs)
    }

    /// Returns warm-up plus measured duration.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.warmup().saturating_add(self.duration())
    }

    /// Returns the closed-loop think time.
    #[must_use]
    pub const fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }

    /// Checks the configuration before a run.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfig` for out-of-range fields and
    /// `ConfigError::Flow` for an invalid rate pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.write_ratio) {
            return Err(ConfigError::invalid(
                "write_ratio",
                format!("must be within [0, 1], got {}", self.write_ratio),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        for (field, secs) in [
            ("duration_secs", self.duration_secs),
            ("warmup_secs", self.warmup_secs),
        ] {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be a non-negative number of seconds, got {secs}"),
                ));
            }
        }
        if self.warmup_secs + self.duration_secs > MAX_RUN_SECS {
            return Err(ConfigError::invalid(
                "duration_secs",
                format!(
                    "warm-up plus duration must not exceed {MAX_RUN_SECS}s, got {}s",
                    self.warmup_secs + self.duration_secs
                ),
            ));
        }

        self.rate_pattern.validate()?;
        if self.mode == ExecutionMode::OpenLoop
            && !self.rate_pattern.enabled
            && self.requests_per_second == 0
        {
            return Err(ConfigError::invalid(
                "requests_per_second",
                "must be at least 1 in open-loop mode",
            ));
        }

        if let Some(t) = self.templates.iter().find(|t| t.min_value > t.max_value) {
            return Err(ConfigError::invalid(
                "templates",
                format!(
                    "template {:?} has min_value {} above max_value {}",
                    t.name, t.min_value, t.max_value
                ),
            ));
        }
        Ok(())
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

/// Builder for `BenchmarkConfig`.
#[derive(Debug, Default)]
pub struct BenchmarkConfigBuilder {
    config: BenchmarkConfig,
}

impl BenchmarkConfigBuilder {
    /// Sets the measured duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: f64) -> Self {
        self.config.duration_secs = secs;
        self
    }

    /// Sets the warm-up duration in seconds.
    #[must_use]
    pub fn warmup_secs(mut self, secs: f64) -> Self {
        self.config.warmup_secs = secs;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn concurrency(mut self, concurrency: u32) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Sets the write ratio.
    #[must_use]
    pub fn write_ratio(mut self, ratio: f64) -> Self {
        self.config.write_ratio = ratio;
        self
    }

    /// Sets the dispatch model.
    #[must_use]
    pub const fn mode(mut self, mode: ExecutionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the open-loop base rate.
    #[must_use]
    pub const fn requests_per_second(mut self, rate: u64) -> Self {
        self.config.requests_per_second = rate;
        self
    }

    /// Sets the rate pattern.
    #[must_use]
    pub fn rate_pattern(mut self, pattern: RatePatternConfig) -> Self {
        self.config.rate_pattern = pattern;
        self
    }

    /// Sets the closed-loop think time in milliseconds.
    #[must_use]
    pub const fn think_time_ms(mut self, ms: u64) -> Self {
        self.config.think_time_ms = ms;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Sets the record template pool.
    #[must_use]
    pub fn templates(mut self, templates: Vec<RecordTemplate>) -> Self {
        self.config.templates = templates;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> BenchmarkConfig {
        self.config
    }
}
