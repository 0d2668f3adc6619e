//! Target store capability.
//!
//! The executor talks to the system under test only through `DataStore`.
//! Connection management, retries and per-call timeouts belong to the
//! implementation; the executor treats every `StoreError` from `write` or
//! `read_by_key` as an operation failure. Only `wait_ready` failing aborts a run.
//!
//! `MemoryStore` is a simulated store with latency, jitter and failure
//! injection, used by the CLI and the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use surge_core::{NodeId, Record, RecordKey};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::ConfigError;

/// Interval between readiness polls.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors returned by a `DataStore`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store (or the routed node) cannot be reached.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The store did not become ready or answer in time.
    #[error("timed out after {waited_ms}ms")]
    Timeout {
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// No record exists for the key.
    #[error("record not found: {key}")]
    NotFound {
        /// Key that was looked up.
        key: RecordKey,
    },

    /// The store refused the request.
    #[error("request rejected: {message}")]
    Rejected {
        /// Reason given by the store.
        message: String,
    },
}

/// Capability the executor uses to reach the system under test.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Returns the number of nodes operations can be routed to.
    fn node_count(&self) -> u32 {
        1
    }

    /// Waits until the store accepts operations.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not reachable within `timeout`.
    async fn wait_ready(&self, timeout: Duration) -> Result<(), StoreError>;

    /// Writes a record through `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is not acknowledged.
    async fn write(&self, node: NodeId, record: &Record) -> Result<(), StoreError>;

    /// Reads the record stored under `key` through `node`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the key is unknown.
    async fn read_by_key(&self, node: NodeId, key: &RecordKey) -> Result<Record, StoreError>;
}

/// Configuration of the simulated store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of simulated nodes.
    pub nodes: u32,
    /// Base latency of every call in microseconds.
    pub latency_us: u64,
    /// Extra latency drawn uniformly from `[0, jitter_us]`.
    pub jitter_us: u64,
    /// Probability that a call fails.
    pub failure_rate: f64,
    /// Seed for latency and failure draws. Random when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            latency_us: 500,
            jitter_us: 250,
            failure_rate: 0.0,
            seed: None,
        }
    }
}

impl StoreConfig {
    /// Checks the simulated store settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfig` if `nodes` is zero or
    /// `failure_rate` is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes == 0 {
            return Err(ConfigError::InvalidConfig {
                field: "store.nodes",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::InvalidConfig {
                field: "store.failure_rate",
                reason: format!("must be within [0, 1], got {}", self.failure_rate),
            });
        }
        Ok(())
    }
}

/// In-memory simulated store.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: u32,
    latency_us: u64,
    jitter_us: u64,
    failure_rate: f64,
    records: RwLock<HashMap<RecordKey, Record>>,
    rng: Mutex<ChaCha8Rng>,
    available: AtomicBool,
    writes: AtomicU64,
    reads: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl MemoryStore {
    /// Creates a store from `config`. Out-of-range settings are clamped.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        let failure_rate = if config.failure_rate.is_nan() {
            0.0
        } else {
            config.failure_rate.clamp(0.0, 1.0)
        };
        Self {
            nodes: config.nodes.max(1),
            latency_us: config.latency_us,
            jitter_us: config.jitter_us,
            failure_rate,
            records: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
            available: AtomicBool::new(true),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    /// Makes every node reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns the number of write calls received.
    #[must_use]
    pub fn write_calls(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of read calls received.
    #[must_use]
    pub fn read_calls(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Simulates the round trip to `node`.
    async fn round_trip(&self, node: NodeId) -> Result<(), StoreError> {
        if node.get() >= u64::from(self.nodes) {
            return Err(StoreError::Rejected {
                message: format!("unknown {node}"),
            });
        }

        let (delay_us, fail) = {
            let mut rng = self.rng.lock();
            let jitter = if self.jitter_us > 0 {
                rng.gen_range(0..=self.jitter_us)
            } else {
                0
            };
            (self.latency_us.saturating_add(jitter), rng.gen_bool(self.failure_rate))
        };
        if delay_us > 0 {
            tokio::time::sleep(Duration::from_micros(delay_us)).await;
        }

        if !self.available.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable {
                message: format!("{node} is down"),
            });
        }
        if fail {
            return Err(StoreError::Unavailable {
                message: format!("injected failure on {node}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn node_count(&self) -> u32 {
        self.nodes
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<(), StoreError> {
        let started = Instant::now();
        loop {
            if self.available.load(Ordering::Acquire) {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(StoreError::Timeout {
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL.min(timeout - waited)).await;
        }
    }

    async fn write(&self, node: NodeId, record: &Record) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.round_trip(node).await?;
        self.records.write().insert(record.key(), record.clone());
        Ok(())
    }

    async fn read_by_key(&self, node: NodeId, key: &RecordKey) -> Result<Record, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.round_trip(node).await?;
        self.records
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound { key: *key })
    }
}
