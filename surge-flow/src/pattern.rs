//! Rate pattern configuration.
//!
//! A rate pattern makes the open-loop target rate vary over time to emulate
//! bursty or drifting load. All durations are in (possibly fractional) seconds
//! so they map one-to-one onto profile files.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};

/// How a rate pattern varies the target rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Alternate between a valley at `min_rate` and a peak at `max_rate`.
    #[default]
    Cycles,
    /// Redraw the rate uniformly from `[min_rate, max_rate]` on an interval.
    Random,
}

/// Configuration for a time-varying target rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatePatternConfig {
    /// Whether the pattern is applied. When false the base rate is constant.
    pub enabled: bool,
    /// Pattern mode.
    pub mode: PatternMode,
    /// Lower rate bound in requests per second.
    pub min_rate: u64,
    /// Upper rate bound in requests per second.
    pub max_rate: u64,
    /// How long the peak phase holds, in seconds (`cycles` mode).
    #[serde(rename = "peak_duration_seconds")]
    pub peak_duration_secs: f64,
    /// How long the valley phase holds, in seconds (`cycles` mode).
    #[serde(rename = "valley_duration_seconds")]
    pub valley_duration_secs: f64,
    /// Seconds between rate redraws (`random` mode).
    #[serde(rename = "change_interval_seconds")]
    pub change_interval_secs: f64,
}

impl Default for RatePatternConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: PatternMode::Cycles,
            min_rate: 10,
            max_rate: 100,
            peak_duration_secs: 10.0,
            valley_duration_secs: 10.0,
            change_interval_secs: 1.0,
        }
    }
}

impl RatePatternConfig {
    /// A disabled pattern (constant base rate).
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// An enabled `cycles` pattern.
    #[must_use]
    pub fn cycles(min_rate: u64, max_rate: u64, peak_secs: f64, valley_secs: f64) -> Self {
        Self {
            enabled: true,
            mode: PatternMode::Cycles,
            min_rate,
            max_rate,
            peak_duration_secs: peak_secs,
            valley_duration_secs: valley_secs,
            ..Self::default()
        }
    }

    /// An enabled `random` pattern.
    #[must_use]
    pub fn random(min_rate: u64, max_rate: u64, change_interval_secs: f64) -> Self {
        Self {
            enabled: true,
            mode: PatternMode::Random,
            min_rate,
            max_rate,
            change_interval_secs,
            ..Self::default()
        }
    }

    /// Validates the pattern. A disabled pattern is always valid.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidConfig` if a bound is zero, the bounds are
    /// inverted, or the duration relevant to the mode is not positive.
    pub fn validate(&self) -> FlowResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.min_rate == 0 {
            return Err(FlowError::invalid("rate_pattern.min_rate must be at least 1"));
        }
        if self.min_rate > self.max_rate {
            return Err(FlowError::invalid(format!(
                "rate_pattern.min_rate ({}) exceeds max_rate ({})",
                self.min_rate, self.max_rate
            )));
        }
        match self.mode {
            PatternMode::Cycles => {
                positive_secs("rate_pattern.peak_duration_seconds", self.peak_duration_secs)?;
                positive_secs("rate_pattern.valley_duration_seconds", self.valley_duration_secs)
            }
            PatternMode::Random => {
                positive_secs("rate_pattern.change_interval_seconds", self.change_interval_secs)
            }
        }
    }
}

fn positive_secs(field: &str, secs: f64) -> FlowResult<()> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(FlowError::invalid(format!("{field} must be a positive number of seconds, got {secs}")))
    }
}

/// Converts fractional seconds to whole microseconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Validated positive and finite.
pub(crate) fn secs_to_us(secs: f64) -> u64 {
    (secs * 1_000_000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_pattern_is_valid() {
        let mut pattern = RatePatternConfig::disabled();
        pattern.min_rate = 0;
        assert!(pattern.validate().is_ok());
    }

    #[test]
    fn test_zero_min_rate_rejected() {
        let pattern = RatePatternConfig::cycles(0, 100, 1.0, 1.0);
        assert!(matches!(pattern.validate(), Err(FlowError::InvalidConfig { .. })));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let pattern = RatePatternConfig::random(20, 10, 1.0);
        let err = pattern.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_rate"));
    }

    #[test]
    fn test_equal_bounds_allowed() {
        assert!(RatePatternConfig::random(10, 10, 0.5).validate().is_ok());
    }

    #[test]
    fn test_mode_specific_durations() {
        // Random mode ignores phase durations.
        let mut pattern = RatePatternConfig::random(5, 15, 1.0);
        pattern.peak_duration_secs = 0.0;
        assert!(pattern.validate().is_ok());

        pattern.change_interval_secs = 0.0;
        assert!(pattern.validate().is_err());

        let cycles = RatePatternConfig::cycles(5, 15, f64::NAN, 1.0);
        assert!(cycles.validate().is_err());
    }

    #[test]
    fn test_toml_field_names() {
        let pattern: RatePatternConfig = toml::from_str(
            r#"
            enabled = true
            mode = "random"
            min_rate = 5
            max_rate = 15
            change_interval_seconds = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(pattern.mode, PatternMode::Random);
        assert_eq!(pattern.max_rate, 15);
        assert!((pattern.change_interval_secs - 0.5).abs() < f64::EPSILON);
        // Unset fields fall back to defaults.
        assert!((pattern.peak_duration_secs - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_secs_to_us() {
        assert_eq!(secs_to_us(1.0), 1_000_000);
        assert_eq!(secs_to_us(0.25), 250_000);
    }
}
