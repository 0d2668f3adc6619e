//! Surge Core - Strongly-typed identifiers and record types for Surge.
//!
//! This crate holds the vocabulary shared by the rate controller and the
//! workload engine: who issued an operation (`WorkerId`), which node of the
//! target store served it (`NodeId`), and what was written or read
//! (`RecordKey`, `Record`).
//!
//! # Design Principles
//!
//! - **Strongly-typed IDs**: Prevent mixing up `WorkerId` with `NodeId`
//! - **Time-ordered keys**: Record keys are UUIDv7, so keys sort by creation time
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod record;
mod types;

pub use record::{default_templates, Record, RecordTemplate};
pub use types::{NodeId, RecordKey, WorkerId};
