//! Run counters.
//!
//! Counts only. Latency distributions are left to whatever consumes the
//! result log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::ExecutionMode;

/// Live counters updated by workers while a run is in progress.
#[derive(Debug, Default)]
pub struct RunCounters {
    issued: AtomicU64,
    writes_ok: AtomicU64,
    writes_failed: AtomicU64,
    reads_ok: AtomicU64,
    reads_failed: AtomicU64,
    reads_skipped: AtomicU64,
    warmup_discarded: AtomicU64,
    recorded: AtomicU64,
    dropped: AtomicU64,
    live_workers: AtomicU64,
    in_flight: AtomicU64,
}

impl RunCounters {
    pub(crate) fn operation_issued(&self) {
        self.issued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_finished(&self, success: bool) {
        let counter = if success { &self.writes_ok } else { &self.writes_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read_finished(&self, success: bool) {
        let counter = if success { &self.reads_ok } else { &self.reads_failed };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read_skipped(&self) {
        self.reads_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn warmup_discarded(&self) {
        self.warmup_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recorded(&self) {
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a dropped result and returns the new drop total.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn worker_stopped(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn operation_started(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn operation_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Returns the number of closed-loop workers currently running.
    #[must_use]
    pub fn live_workers(&self) -> u64 {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Returns the number of open-loop operations currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self, mode: ExecutionMode, elapsed: Duration) -> RunStats {
        RunStats {
            mode,
            elapsed,
            issued: self.issued.load(Ordering::Relaxed),
            writes_ok: self.writes_ok.load(Ordering::Relaxed),
            writes_failed: self.writes_failed.load(Ordering::Relaxed),
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
            reads_skipped: self.reads_skipped.load(Ordering::Relaxed),
            warmup_discarded: self.warmup_discarded.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Totals of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Dispatch model used.
    pub mode: ExecutionMode,
    /// Wall-clock time from run start to the last operation completing.
    pub elapsed: Duration,
    /// Operations sent to the store. Skipped reads are not counted.
    pub issued: u64,
    /// Acknowledged writes.
    pub writes_ok: u64,
    /// Failed writes.
    pub writes_failed: u64,
    /// Successful reads.
    pub reads_ok: u64,
    /// Failed reads.
    pub reads_failed: u64,
    /// Reads skipped because no key had been written yet.
    pub reads_skipped: u64,
    /// Outcomes not reported because they started during warm-up.
    pub warmup_discarded: u64,
    /// Outcomes accepted by the result sink.
    pub recorded: u64,
    /// Outcomes rejected by the result sink.
    pub dropped: u64,
}

impl RunStats {
    /// Returns the number of failed operations.
    #[must_use]
    pub const fn failed(&self) -> u64 {
        self.writes_failed + self.reads_failed
    }

    /// Returns issued operations per second of elapsed time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.issued as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a human-readable summary.
    pub fn print_summary(&self) {
        println!("=== Benchmark Statistics ({}) ===", self.mode);
        println!(
            "Operations: {} issued, {} failed (writes: {} ok / {} failed, reads: {} ok / {} failed / {} skipped)",
            self.issued,
            self.failed(),
            self.writes_ok,
            self.writes_failed,
            self.reads_ok,
            self.reads_failed,
            self.reads_skipped
        );
        println!(
            "Results: {} recorded, {} dropped, {} discarded in warm-up",
            self.recorded, self.dropped, self.warmup_discarded
        );
        println!("Throughput: {:.0} ops/sec", self.throughput());
        println!("Duration: {}ms", self.elapsed.as_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let counters = RunCounters::default();
        counters.operation_issued();
        counters.operation_issued();
        counters.write_finished(true);
        counters.read_finished(false);
        counters.read_skipped();
        counters.recorded();
        assert_eq!(counters.dropped(), 1);

        let stats = counters.snapshot(ExecutionMode::OpenLoop, Duration::from_secs(2));
        assert_eq!(stats.issued, 2);
        assert_eq!(stats.writes_ok, 1);
        assert_eq!(stats.reads_failed, 1);
        assert_eq!(stats.reads_skipped, 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.dropped, 1);
        assert!((stats.throughput() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gauges() {
        let counters = RunCounters::default();
        counters.worker_started();
        counters.worker_started();
        counters.worker_stopped();
        counters.operation_started();
        assert_eq!(counters.live_workers(), 1);
        assert_eq!(counters.in_flight(), 1);
    }

    #[test]
    fn test_zero_elapsed_throughput() {
        let stats = RunCounters::default().snapshot(ExecutionMode::ClosedLoop, Duration::ZERO);
        assert!(stats.throughput().abs() < f64::EPSILON);
    }
}
