//! Benchmark profiles.
//!
//! A profile bundles everything one `surge-bench run` needs: the benchmark
//! configuration, where and how results are written, and the simulated store
//! settings. Profiles are TOML documents; a handful are built in.
//!
//! # Example
//!
//! ```toml
//! name = "bursty"
//! description = "Alternating 50/500 rps"
//!
//! [benchmark]
//! duration_secs = 60.0
//! warmup_secs = 5.0
//! write_ratio = 0.3
//!
//! [benchmark.rate_pattern]
//! enabled = true
//! mode = "cycles"
//! min_rate = 50
//! max_rate = 500
//! peak_duration_seconds = 5.0
//! valley_duration_seconds = 10.0
//!
//! [sink]
//! path = "bursty.json"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use surge_flow::RatePatternConfig;

use crate::config::{BenchmarkConfig, ConfigError, ExecutionMode};
use crate::sink::SinkConfig;
use crate::store::StoreConfig;

/// A complete benchmark profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkProfile {
    /// Profile name.
    pub name: String,
    /// Description of what this profile exercises.
    pub description: String,
    /// Benchmark configuration.
    pub benchmark: BenchmarkConfig,
    /// Result sink configuration.
    pub sink: SinkConfig,
    /// Simulated store configuration.
    pub store: StoreConfig,
}

impl Default for BenchmarkProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: "Default benchmark profile".to_string(),
            benchmark: BenchmarkConfig::default(),
            sink: SinkConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl BenchmarkProfile {
    /// Load a profile from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse a profile from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML cannot be parsed.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Serialize the profile to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Checks every section of the profile.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.benchmark.validate()?;
        self.store.validate()
    }
}

fn profile(name: &str, desc: &str, benchmark: BenchmarkConfig) -> BenchmarkProfile {
    BenchmarkProfile {
        name: name.to_string(),
        description: desc.to_string(),
        benchmark,
        sink: SinkConfig {
            path: format!("{name}.json").into(),
            ..SinkConfig::default()
        },
        store: StoreConfig::default(),
    }
}

/// Built-in benchmark profiles for common testing scenarios.
#[must_use]
pub fn builtin_profiles() -> HashMap<&'static str, BenchmarkProfile> {
    let open = |rps: u64, warmup: f64, duration: f64| {
        BenchmarkConfig::builder()
            .mode(ExecutionMode::OpenLoop)
            .requests_per_second(rps)
            .warmup_secs(warmup)
            .duration_secs(duration)
    };

    HashMap::from([
        (
            "baseline",
            profile(
                "baseline",
                "Quick sanity check at a low constant rate",
                open(20, 1.0, 5.0).concurrency(2).build(),
            ),
        ),
        (
            "steady",
            profile(
                "steady",
                "Constant open-loop rate, read-heavy",
                open(200, 5.0, 60.0).concurrency(10).write_ratio(0.2).build(),
            ),
        ),
        (
            "cycles",
            profile(
                "cycles",
                "Alternating valley and peak load",
                open(0, 5.0, 120.0)
                    .concurrency(10)
                    .rate_pattern(RatePatternConfig::cycles(50, 500, 10.0, 20.0))
                    .build(),
            ),
        ),
        (
            "random",
            profile(
                "random",
                "Target rate redrawn every second",
                open(0, 5.0, 120.0)
                    .concurrency(10)
                    .rate_pattern(RatePatternConfig::random(20, 400, 1.0))
                    .build(),
            ),
        ),
        (
            "saturate",
            profile(
                "saturate",
                "Closed-loop worker pool with no think time",
                BenchmarkConfig::builder()
                    .mode(ExecutionMode::ClosedLoop)
                    .concurrency(32)
                    .think_time_ms(0)
                    .warmup_secs(5.0)
                    .duration_secs(60.0)
                    .build(),
            ),
        ),
    ])
}

/// Load a built-in profile by name.
///
/// # Errors
///
/// Returns an error if the profile name is not found.
pub fn load_profile(name: &str) -> Result<BenchmarkProfile, ConfigError> {
    builtin_profiles()
        .remove(name)
        .ok_or_else(|| ConfigError::NotFound {
            name: name.to_string(),
        })
}

/// List all available built-in profile names.
#[must_use]
pub fn list_profiles() -> Vec<&'static str> {
    let mut names: Vec<_> = builtin_profiles().keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use surge_flow::PatternMode;

    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = BenchmarkProfile::default();
        assert_eq!(profile.sink.capacity, 10_000);
        assert_eq!(profile.sink.batch_size, 500);
        assert_eq!(profile.sink.flush_interval_ms, 3_000);
        assert_eq!(profile.sink.path, Path::new("result.json"));
    }

    #[test]
    fn test_builtin_profiles_are_valid() {
        assert_eq!(
            list_profiles(),
            vec!["baseline", "cycles", "random", "saturate", "steady"]
        );
        for (name, profile) in builtin_profiles() {
            assert_eq!(profile.name, name);
            profile.validate().unwrap();
        }
    }

    #[test]
    fn test_load_profile() {
        let profile = load_profile("cycles").unwrap();
        assert!(profile.benchmark.rate_pattern.enabled);
        assert_eq!(profile.benchmark.rate_pattern.mode, PatternMode::Cycles);
        assert_eq!(profile.sink.path, Path::new("cycles.json"));
    }

    #[test]
    fn test_profile_not_found() {
        let result = load_profile("nonexistent");
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_toml_roundtrip() {
        let profile = load_profile("random").unwrap();
        let toml = profile.to_toml();
        let parsed = BenchmarkProfile::from_toml(&toml).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let profile = BenchmarkProfile::from_toml(
            r#"
            name = "bursty"

            [benchmark]
            write_ratio = 0.3

            [benchmark.rate_pattern]
            enabled = true
            mode = "cycles"
            min_rate = 50
            max_rate = 500

            [store]
            nodes = 5
            "#,
        )
        .unwrap();

        assert_eq!(profile.name, "bursty");
        assert!((profile.benchmark.write_ratio - 0.3).abs() < f64::EPSILON);
        assert_eq!(profile.benchmark.rate_pattern.max_rate, 500);
        assert_eq!(profile.store.nodes, 5);
        assert_eq!(profile.sink, SinkConfig::default());
        profile.validate().unwrap();
    }

    #[test]
    fn test_bad_toml() {
        let result = BenchmarkProfile::from_toml("benchmark = 3");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, load_profile("steady").unwrap().to_toml()).unwrap();

        let profile = BenchmarkProfile::from_file(&path).unwrap();
        assert_eq!(profile.name, "steady");

        let missing = BenchmarkProfile::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
