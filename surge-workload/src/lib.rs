//! Surge Workload: load generation and measurement against a data store.
//!
//! Decides when operations fire, how many run at once, whether each is a read
//! or a write, and records every measured outcome without stalling the
//! operation path.
//!
//! # Architecture
//!
//! ```text
//!                 ┌───────────────────────────────────────────┐
//!                 │                 Executor                  │
//!  RateController │  open-loop: paced ticks ─▶ spawned ops     │
//!  + Pacer ──────▶│  closed-loop: N workers, op ─▶ think ─▶ op │
//!                 └──────┬──────────────┬──────────────┬──────┘
//!                        │              │              │
//!            OperationGenerator     DataStore      SinkHandle ──▶ ResultSink ──▶ result.json
//!                        │          (MemoryStore)
//!                   KeyRegistry
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use surge_workload::{run, BenchmarkConfig, MemoryStore, ResultSink, SinkConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = BenchmarkConfig::builder()
//!     .requests_per_second(500)
//!     .warmup_secs(2.0)
//!     .duration_secs(30.0)
//!     .build();
//!
//! let sink = ResultSink::create(&SinkConfig::default()).await?;
//! let store = Arc::new(MemoryStore::default());
//! let stats = run(config, store, sink.handle(), CancellationToken::new()).await?;
//! sink.shutdown().await?;
//!
//! stats.print_summary();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod generator;
mod operation;
mod registry;
mod stats;
mod verify;

pub mod executor;
pub mod probe;
pub mod profiles;
pub mod sink;
pub mod store;

pub use config::{
    BenchmarkConfig, BenchmarkConfigBuilder, ConfigError, ExecutionMode, MAX_RUN_SECS,
};
pub use generator::OperationGenerator;
pub use operation::{OperationKind, OperationPayload, OperationRecord};
pub use registry::KeyRegistry;
pub use stats::{RunCounters, RunStats};
pub use verify::{verify_reads, VerificationReport, Violation};

// Re-export the main entry points of the public modules.
pub use executor::{run, Executor, RunError};
pub use probe::{probe, ProbeConfig, ProbeReport, ProbeStep};
pub use profiles::{builtin_profiles, list_profiles, load_profile, BenchmarkProfile};
pub use sink::{ResultSink, SinkConfig, SinkError, SinkHandle, SinkSummary};
pub use store::{DataStore, MemoryStore, StoreConfig, StoreError};
