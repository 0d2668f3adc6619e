//! Read-back verification.
//!
//! After a run, samples keys from the registry and reads each one back. Every
//! registered key was acknowledged by the store, so a failed read or a record
//! with a different id is a violation.

use rand::Rng;
use surge_core::{NodeId, RecordKey};
use tracing::{info, warn};

use crate::registry::KeyRegistry;
use crate::store::DataStore;

/// A read-back check that did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// An acknowledged key could not be read back.
    FailedRead {
        /// Key that was looked up.
        key: RecordKey,
        /// Node the read was routed to.
        node: NodeId,
        /// Store error text.
        error: String,
    },

    /// The store returned a record stored under another key.
    MismatchedRecord {
        /// Key that was looked up.
        key: RecordKey,
        /// Id of the returned record.
        returned: RecordKey,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailedRead { key, node, error } => {
                write!(f, "Failed read: {key} via {node} was acknowledged but not readable: {error}")
            }
            Self::MismatchedRecord { key, returned } => {
                write!(f, "Mismatched record: read of {key} returned {returned}")
            }
        }
    }
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Keys read back.
    pub checked: usize,
    /// Checks that failed.
    pub violations: Vec<Violation>,
}

impl VerificationReport {
    /// Returns true if every sampled key read back intact.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Prints a human-readable summary.
    pub fn print_summary(&self) {
        println!("=== Read Verification ===");
        println!("Checked: {} keys", self.checked);
        println!("Violations: {}", self.violations.len());
        for v in &self.violations {
            println!("  - {v}");
        }
    }
}

/// Reads back up to `samples` distinct registered keys, spreading reads
/// across the store's nodes.
pub async fn verify_reads<S, R>(
    store: &S,
    registry: &KeyRegistry,
    samples: usize,
    rng: &mut R,
) -> VerificationReport
where
    S: DataStore + ?Sized,
    R: Rng + ?Sized,
{
    let keys = registry.sample_many(samples, rng);
    let node_count = u64::from(store.node_count().max(1));
    let mut report = VerificationReport {
        checked: keys.len(),
        violations: Vec::new(),
    };

    for (i, key) in (0u64..).zip(keys) {
        let node = NodeId::new(i % node_count);
        match store.read_by_key(node, &key).await {
            Ok(record) if record.key() == key => {}
            Ok(record) => report.violations.push(Violation::MismatchedRecord {
                key,
                returned: record.key(),
            }),
            Err(e) => report.violations.push(Violation::FailedRead {
                key,
                node,
                error: e.to_string(),
            }),
        }
    }

    if report.is_clean() {
        info!(checked = report.checked, "Read verification passed");
    } else {
        warn!(
            checked = report.checked,
            violations = report.violations.len(),
            "Read verification found violations"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use surge_core::Record;

    use super::*;
    use crate::store::{MemoryStore, StoreConfig, StoreError};

    fn record(rng: &mut ChaCha8Rng) -> Record {
        Record {
            id: RecordKey::generate(1_700_000_000_000, rng),
            category: "Finance".to_string(),
            data: "Charlie".to_string(),
            timestamp: Utc::now(),
            value: 70_000,
        }
    }

    fn instant_store() -> MemoryStore {
        MemoryStore::new(&StoreConfig {
            latency_us: 0,
            jitter_us: 0,
            seed: Some(1),
            ..StoreConfig::default()
        })
    }

    #[tokio::test]
    async fn test_clean_verification() {
        let store = instant_store();
        let registry = KeyRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            let r = record(&mut rng);
            store.write(NodeId::new(0), &r).await.unwrap();
            registry.record(r.key());
        }

        let report = verify_reads(&store, &registry, 10, &mut rng).await;
        assert_eq!(report.checked, 10);
        assert!(report.is_clean());
        assert_eq!(store.read_calls(), 10);
    }

    #[tokio::test]
    async fn test_unwritten_key_is_violation() {
        let store = instant_store();
        let registry = KeyRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let lost = record(&mut rng);
        registry.record(lost.key());

        let report = verify_reads(&store, &registry, 5, &mut rng).await;
        assert_eq!(report.checked, 1);
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::FailedRead { key, .. }] if *key == lost.key()
        ));
    }

    /// Store that answers every read with the same record.
    struct ConfusedStore {
        answer: Record,
    }

    #[async_trait]
    impl DataStore for ConfusedStore {
        async fn wait_ready(&self, _timeout: Duration) -> Result<(), StoreError> {
            Ok(())
        }

        async fn write(&self, _node: NodeId, _record: &Record) -> Result<(), StoreError> {
            Ok(())
        }

        async fn read_by_key(&self, _node: NodeId, _key: &RecordKey) -> Result<Record, StoreError> {
            Ok(self.answer.clone())
        }
    }

    #[tokio::test]
    async fn test_mismatched_record_is_violation() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let store = ConfusedStore {
            answer: record(&mut rng),
        };
        let registry = KeyRegistry::new();
        let asked = record(&mut rng);
        registry.record(asked.key());

        let report = verify_reads(&store, &registry, 1, &mut rng).await;
        assert_eq!(
            report.violations,
            vec![Violation::MismatchedRecord {
                key: asked.key(),
                returned: store.answer.key(),
            }]
        );
        assert!(report.violations[0].to_string().starts_with("Mismatched record"));
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let store = instant_store();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let report = verify_reads(&store, &KeyRegistry::new(), 10, &mut rng).await;
        assert_eq!(report, VerificationReport::default());
    }
}
