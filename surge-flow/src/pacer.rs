//! Pacing timer.
//!
//! `Pacer` owns the interval timer an open-loop dispatch loop waits on. A rate
//! change swaps the underlying timer in place; the first tick of the new timer
//! lands one new period after the swap. Elapsed-run accounting lives with the
//! caller, so swapping never resets the benchmark clock.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Nanoseconds per second.
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Returns the tick period for a rate in requests per second.
///
/// A rate of 0 is clamped to 1 request per second. Rates above one billion
/// per second are floored at a 1ns period.
#[must_use]
pub fn period_for_rate(rate: u64) -> Duration {
    Duration::from_nanos((NANOS_PER_SEC / rate.max(1)).max(1))
}

/// An interval timer whose rate can be replaced in place.
#[derive(Debug)]
pub struct Pacer {
    interval: Interval,
    rate: u64,
    period: Duration,
}

impl Pacer {
    /// Creates a pacer firing `rate` times per second.
    ///
    /// The first tick fires one period from now. Must be called from within a
    /// tokio runtime.
    #[must_use]
    pub fn new(rate: u64) -> Self {
        let rate = rate.max(1);
        let period = period_for_rate(rate);
        Self {
            interval: Self::make_interval(period),
            rate,
            period,
        }
    }

    fn make_interval(period: Duration) -> Interval {
        let mut interval = interval_at(Instant::now() + period, period);
        // A stalled loop resumes at the target rate instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    /// Returns the current rate in requests per second.
    #[must_use]
    pub const fn rate(&self) -> u64 {
        self.rate
    }

    /// Returns the current tick period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Replaces the timer if `rate` differs from the current rate.
    ///
    /// Returns true if the timer was replaced.
    pub fn set_rate(&mut self, rate: u64) -> bool {
        let rate = rate.max(1);
        if rate == self.rate {
            return false;
        }
        let period = period_for_rate(rate);
        debug!(
            old_rate = self.rate,
            new_rate = rate,
            period_us = period.as_micros(),
            "Replacing pacing timer"
        );
        self.interval = Self::make_interval(period);
        self.rate = rate;
        self.period = period;
        true
    }

    /// Waits for the next tick and returns its scheduled instant.
    ///
    /// Cancel-safe: dropping the future before it completes loses no tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_for_rate() {
        assert_eq!(period_for_rate(1), Duration::from_secs(1));
        assert_eq!(period_for_rate(10), Duration::from_millis(100));
        assert_eq!(period_for_rate(3), Duration::from_nanos(333_333_333));
    }

    #[test]
    fn test_period_for_rate_clamps() {
        assert_eq!(period_for_rate(0), Duration::from_secs(1));
        assert_eq!(period_for_rate(u64::MAX), Duration::from_nanos(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_rate() {
        let start = Instant::now();
        let mut pacer = Pacer::new(10);

        for i in 1..=5u32 {
            pacer.tick().await;
            assert_eq!(start.elapsed(), Duration::from_millis(100) * i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rate_swaps_timer() {
        let start = Instant::now();
        let mut pacer = Pacer::new(10);

        pacer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        assert!(pacer.set_rate(100));
        assert_eq!(pacer.rate(), 100);
        assert_eq!(pacer.period(), Duration::from_millis(10));

        // The new timer's first tick is one new period after the swap.
        pacer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(110));
        pacer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_same_rate_is_noop() {
        let start = Instant::now();
        let mut pacer = Pacer::new(20);

        assert!(!pacer.set_rate(20));
        pacer.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_clamped() {
        let mut pacer = Pacer::new(0);
        assert_eq!(pacer.rate(), 1);
        assert!(!pacer.set_rate(0));
        assert!(pacer.set_rate(2));
        assert_eq!(pacer.period(), Duration::from_millis(500));
    }
}
