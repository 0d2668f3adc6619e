//! Rate controller.
//!
//! The `RateController` owns the rate state of an open-loop run: the current
//! target rate plus, depending on the pattern, the peak/valley phase and its
//! start time or the time of the last random redraw. It is polled once per
//! dispatch tick; phase transitions are edge-triggered on those polls, so a
//! boundary can overshoot by up to one tick period.

use rand::Rng;

use crate::error::{FlowError, FlowResult};
use crate::pattern::{secs_to_us, PatternMode, RatePatternConfig};

/// Phase of a `cycles` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Running at `max_rate`.
    Peak,
    /// Running at `min_rate`.
    Valley,
}

impl Phase {
    /// Returns the phase name for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Peak => "peak",
            Self::Valley => "valley",
        }
    }
}

#[derive(Debug)]
enum Schedule {
    Constant,
    Cycles {
        phase: Phase,
        phase_start_us: u64,
        peak_us: u64,
        valley_us: u64,
        min_rate: u64,
        max_rate: u64,
    },
    Random {
        last_change_us: u64,
        interval_us: u64,
        min_rate: u64,
        max_rate: u64,
    },
}

/// Computes the current target rate of an open-loop run.
#[derive(Debug)]
pub struct RateController {
    schedule: Schedule,

    /// Current target rate in requests per second. Always at least 1.
    current_rate: u64,

    /// Number of rate changes reported so far.
    total_changes: u64,
}

impl RateController {
    /// Creates a controller.
    ///
    /// A disabled pattern yields a constant `requests_per_second`. An enabled
    /// pattern starts at `min_rate`: `cycles` opens in the valley phase.
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Base rate used when the pattern is disabled.
    /// * `pattern` - The rate pattern.
    /// * `now_us` - Current time in microseconds.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::InvalidConfig` if the pattern is invalid, or if it
    /// is disabled and `requests_per_second` is zero.
    pub fn new(
        requests_per_second: u64,
        pattern: &RatePatternConfig,
        now_us: u64,
    ) -> FlowResult<Self> {
        pattern.validate()?;

        let (schedule, current_rate) = if !pattern.enabled {
            if requests_per_second == 0 {
                return Err(FlowError::invalid("requests_per_second must be at least 1"));
            }
            (Schedule::Constant, requests_per_second)
        } else {
            match pattern.mode {
                PatternMode::Cycles => (
                    Schedule::Cycles {
                        phase: Phase::Valley,
                        phase_start_us: now_us,
                        peak_us: secs_to_us(pattern.peak_duration_secs),
                        valley_us: secs_to_us(pattern.valley_duration_secs),
                        min_rate: pattern.min_rate,
                        max_rate: pattern.max_rate,
                    },
                    pattern.min_rate,
                ),
                PatternMode::Random => (
                    Schedule::Random {
                        last_change_us: now_us,
                        interval_us: secs_to_us(pattern.change_interval_secs),
                        min_rate: pattern.min_rate,
                        max_rate: pattern.max_rate,
                    },
                    pattern.min_rate,
                ),
            }
        };

        Ok(Self {
            schedule,
            current_rate,
            total_changes: 0,
        })
    }

    /// Returns the current target rate in requests per second.
    #[must_use]
    pub const fn current_rate(&self) -> u64 {
        self.current_rate
    }

    /// Returns the current phase, if running a `cycles` pattern.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self.schedule {
            Schedule::Cycles { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Returns the number of rate changes reported so far.
    #[must_use]
    pub const fn total_changes(&self) -> u64 {
        self.total_changes
    }

    /// Advances the schedule to `now_us`.
    ///
    /// # Arguments
    ///
    /// * `now_us` - Current time in microseconds.
    /// * `rng` - Source for `random` redraws.
    ///
    /// # Returns
    ///
    /// The new rate if it changed, `None` otherwise. A phase flip between
    /// equal bounds is not a rate change.
    pub fn observe<R: Rng + ?Sized>(&mut self, now_us: u64, rng: &mut R) -> Option<u64> {
        let next_rate = match &mut self.schedule {
            Schedule::Constant => None,
            Schedule::Cycles {
                phase,
                phase_start_us,
                peak_us,
                valley_us,
                min_rate,
                max_rate,
            } => {
                let hold_us = match phase {
                    Phase::Peak => *peak_us,
                    Phase::Valley => *valley_us,
                };
                if now_us.saturating_sub(*phase_start_us) >= hold_us {
                    *phase_start_us = now_us;
                    *phase = match phase {
                        Phase::Peak => Phase::Valley,
                        Phase::Valley => Phase::Peak,
                    };
                    Some(match phase {
                        Phase::Peak => *max_rate,
                        Phase::Valley => *min_rate,
                    })
                } else {
                    None
                }
            }
            Schedule::Random {
                last_change_us,
                interval_us,
                min_rate,
                max_rate,
            } => {
                if now_us.saturating_sub(*last_change_us) >= *interval_us {
                    *last_change_us = now_us;
                    Some(rng.gen_range(*min_rate..=*max_rate))
                } else {
                    None
                }
            }
        };

        match next_rate {
            Some(rate) if rate != self.current_rate => {
                self.current_rate = rate;
                self.total_changes += 1;
                Some(rate)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const TICK_US: u64 = 10_000;

    #[test]
    fn test_constant_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut controller =
            RateController::new(250, &RatePatternConfig::disabled(), 0).unwrap();

        assert_eq!(controller.current_rate(), 250);
        assert_eq!(controller.phase(), None);
        for t in 0..100 {
            assert_eq!(controller.observe(t * 1_000_000, &mut rng), None);
        }
        assert_eq!(controller.total_changes(), 0);
    }

    #[test]
    fn test_zero_base_rate_rejected() {
        let result = RateController::new(0, &RatePatternConfig::disabled(), 0);
        assert!(matches!(result, Err(FlowError::InvalidConfig { .. })));
    }

    #[test]
    fn test_enabled_pattern_ignores_base_rate() {
        // Base rate 0 is irrelevant once a pattern drives the rate.
        let controller = RateController::new(0, &RatePatternConfig::cycles(3, 9, 1.0, 1.0), 0);
        assert_eq!(controller.unwrap().current_rate(), 3);
    }

    #[test]
    fn test_cycles_alternate_valley_then_peak() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pattern = RatePatternConfig::cycles(10, 100, 2.0, 2.0);
        let mut controller = RateController::new(0, &pattern, 0).unwrap();

        // Sample at every 10ms tick for 8 seconds.
        let mut t = 0;
        while t < 8_000_000 {
            controller.observe(t, &mut rng);
            let expected = if (t / 2_000_000) % 2 == 0 { 10 } else { 100 };
            assert_eq!(controller.current_rate(), expected, "at t={t}us");
            t += TICK_US;
        }
        assert_eq!(controller.total_changes(), 3);
    }

    #[test]
    fn test_cycles_phase_overshoots_by_at_most_one_tick() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pattern = RatePatternConfig::cycles(10, 100, 1.0, 1.0);
        let mut controller = RateController::new(0, &pattern, 0).unwrap();

        // Ticks land 300ms apart, so the 1s boundary is observed at 1.2s.
        assert_eq!(controller.observe(900_000, &mut rng), None);
        assert_eq!(controller.observe(1_200_000, &mut rng), Some(100));
        assert_eq!(controller.phase(), Some(Phase::Peak));

        // The new phase is timed from the observation, not the nominal boundary.
        assert_eq!(controller.observe(2_100_000, &mut rng), None);
        assert_eq!(controller.observe(2_200_000, &mut rng), Some(10));
        assert_eq!(controller.phase(), Some(Phase::Valley));
    }

    #[test]
    fn test_cycles_asymmetric_phases() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let pattern = RatePatternConfig::cycles(5, 50, 0.5, 3.0);
        let mut controller = RateController::new(0, &pattern, 0).unwrap();

        assert_eq!(controller.observe(2_999_999, &mut rng), None);
        assert_eq!(controller.observe(3_000_000, &mut rng), Some(50));
        assert_eq!(controller.observe(3_500_000, &mut rng), Some(5));
    }

    #[test]
    fn test_random_rates_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let pattern = RatePatternConfig::random(5, 15, 1.0);
        let mut controller = RateController::new(0, &pattern, 0).unwrap();

        let mut seen = std::collections::HashSet::new();
        let mut t = 0;
        while t < 120_000_000 {
            controller.observe(t, &mut rng);
            let rate = controller.current_rate();
            assert!((5..=15).contains(&rate), "rate {rate} out of bounds");
            seen.insert(rate);
            t += TICK_US;
        }
        // Both bounds are reachable.
        assert!(seen.contains(&5));
        assert!(seen.contains(&15));
    }

    #[test]
    fn test_random_changes_only_on_interval_boundaries() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let pattern = RatePatternConfig::random(5, 15, 1.0);
        let mut controller = RateController::new(0, &pattern, 0).unwrap();

        let mut change_times = Vec::new();
        let mut t = 0;
        while t < 60_000_000 {
            if controller.observe(t, &mut rng).is_some() {
                change_times.push(t);
            }
            t += TICK_US;
        }

        assert!(!change_times.is_empty());
        assert!(change_times[0] >= 1_000_000);
        for pair in change_times.windows(2) {
            assert!(pair[1] - pair[0] >= 1_000_000, "changes too close: {pair:?}");
        }
    }

    #[test]
    fn test_random_fractional_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let pattern = RatePatternConfig::random(1, 1_000, 0.25);
        let mut controller = RateController::new(0, &pattern, 0).unwrap();

        assert_eq!(controller.observe(249_999, &mut rng), None);
        // At 250ms a redraw happens; with 1000 candidates it almost surely differs.
        assert!(controller.observe(250_000, &mut rng).is_some());
    }
}
