//! Concurrency probe.
//!
//! Steps concurrency from 1 upward, issuing that many simultaneous writes per
//! step, and stops at the first step whose failure rate exceeds the threshold.
//! The stopping step is the saturation point.

use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use surge_core::NodeId;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::generator::OperationGenerator;
use crate::store::DataStore;

/// Probe configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Highest concurrency to try.
    pub max_concurrency: u32,
    /// Failure rate above which the store counts as saturated.
    pub failure_threshold: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 64,
            failure_threshold: 0.05,
        }
    }
}

impl ProbeConfig {
    /// Checks the probe settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfig` if `max_concurrency` is zero or
    /// `failure_threshold` is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidConfig {
                field: "max_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.failure_threshold) {
            return Err(ConfigError::InvalidConfig {
                field: "failure_threshold",
                reason: format!("must be within [0, 1], got {}", self.failure_threshold),
            });
        }
        Ok(())
    }
}

/// Result of one concurrency step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStep {
    /// Simultaneous writes issued.
    pub concurrency: u32,
    /// Acknowledged writes.
    pub successes: u32,
    /// Failed writes.
    pub failures: u32,
    /// Time until the slowest write returned.
    pub elapsed: Duration,
}

impl ProbeStep {
    /// Returns the fraction of writes that failed.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.concurrency == 0 {
            0.0
        } else {
            f64::from(self.failures) / f64::from(self.concurrency)
        }
    }
}

/// Outcome of a probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Steps in the order they ran.
    pub steps: Vec<ProbeStep>,
    /// Concurrency of the first step above the threshold, if any.
    pub saturation: Option<u32>,
}

impl ProbeReport {
    /// Prints a human-readable summary.
    pub fn print_summary(&self) {
        println!("=== Concurrency Probe ===");
        for step in &self.steps {
            println!(
                "concurrency={:<4} ok={:<4} failed={:<4} failure_rate={:.2}% elapsed={}ms",
                step.concurrency,
                step.successes,
                step.failures,
                step.failure_rate() * 100.0,
                step.elapsed.as_millis()
            );
        }
        match self.saturation {
            Some(c) => println!("Store started failing at concurrency {c}"),
            None => println!("No saturation up to concurrency {}", self.steps.len()),
        }
    }
}

/// Runs the probe. Acknowledged keys are added to the generator's registry.
///
/// # Errors
///
/// Returns an error if `config` fails validation.
pub async fn probe<S, R>(
    store: &S,
    generator: &OperationGenerator,
    config: &ProbeConfig,
    rng: &mut R,
) -> Result<ProbeReport, ConfigError>
where
    S: DataStore + ?Sized,
    R: Rng + ?Sized,
{
    config.validate()?;
    let node_count = u64::from(store.node_count().max(1));
    let mut report = ProbeReport::default();

    for concurrency in 1..=config.max_concurrency {
        let records: Vec<_> = (0..concurrency)
            .map(|_| generator.generate_write(rng))
            .collect();

        let started = Instant::now();
        let results = join_all(
            (0u64..)
                .zip(&records)
                .map(|(i, record)| store.write(NodeId::new(i % node_count), record)),
        )
        .await;
        let elapsed = started.elapsed();

        let mut failures = 0u32;
        for (record, result) in records.iter().zip(&results) {
            match result {
                Ok(()) => generator.registry().record(record.key()),
                Err(_) => failures += 1,
            }
        }

        let step = ProbeStep {
            concurrency,
            successes: concurrency - failures,
            failures,
            elapsed,
        };
        let failure_rate = step.failure_rate();
        debug!(concurrency, failures, failure_rate, "Probe step finished");
        report.steps.push(step);

        if failure_rate > config.failure_threshold {
            warn!(concurrency, failure_rate, "Store saturated");
            report.saturation = Some(concurrency);
            break;
        }
    }

    info!(
        steps = report.steps.len(),
        saturation = report.saturation,
        "Concurrency probe finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use surge_core::{Record, RecordKey};

    use super::*;
    use crate::registry::KeyRegistry;
    use crate::store::{MemoryStore, StoreConfig, StoreError};

    /// Store that accepts at most `limit` writes at once.
    struct BoundedStore {
        limit: usize,
        active: AtomicUsize,
    }

    #[async_trait]
    impl DataStore for BoundedStore {
        async fn wait_ready(&self, _timeout: Duration) -> Result<(), StoreError> {
            Ok(())
        }

        async fn write(&self, _node: NodeId, _record: &Record) -> Result<(), StoreError> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if active > self.limit {
                Err(StoreError::Rejected {
                    message: "too many concurrent writes".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn read_by_key(&self, _node: NodeId, key: &RecordKey) -> Result<Record, StoreError> {
            Err(StoreError::NotFound { key: *key })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_finds_saturation() {
        let store = BoundedStore {
            limit: 4,
            active: AtomicUsize::new(0),
        };
        let generator = OperationGenerator::new(Vec::new(), KeyRegistry::new());
        let config = ProbeConfig {
            max_concurrency: 20,
            failure_threshold: 0.1,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let report = probe(&store, &generator, &config, &mut rng).await.unwrap();

        // Concurrency 5 fails 1 of 5 writes (20%), above the 10% threshold.
        assert_eq!(report.saturation, Some(5));
        assert_eq!(report.steps.len(), 5);
        assert!(report.steps[..4].iter().all(|s| s.failures == 0));
        assert_eq!(report.steps[4].failures, 1);
        // 1 + 2 + 3 + 4 + 4 acknowledged writes.
        assert_eq!(generator.registry().len(), 14);
    }

    #[tokio::test]
    async fn test_probe_without_saturation() {
        let store = MemoryStore::new(&StoreConfig {
            latency_us: 0,
            jitter_us: 0,
            seed: Some(2),
            ..StoreConfig::default()
        });
        let generator = OperationGenerator::new(Vec::new(), KeyRegistry::new());
        let config = ProbeConfig {
            max_concurrency: 6,
            failure_threshold: 0.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let report = probe(&store, &generator, &config, &mut rng).await.unwrap();
        assert_eq!(report.saturation, None);
        assert_eq!(report.steps.len(), 6);
        assert_eq!(store.len(), 21);
    }

    #[tokio::test]
    async fn test_probe_rejects_bad_config() {
        let store = MemoryStore::default();
        let generator = OperationGenerator::new(Vec::new(), KeyRegistry::new());
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let config = ProbeConfig {
            max_concurrency: 0,
            ..ProbeConfig::default()
        };
        assert!(probe(&store, &generator, &config, &mut rng).await.is_err());
    }
}
