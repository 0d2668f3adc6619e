//! Rate control and pacing for Surge.
//!
//! This crate decides *when* an open-loop benchmark may issue its next
//! operation. It includes:
//!
//! - **Rate patterns**: Constant, cyclical peak/valley, or randomized target rates.
//! - **Rate controller**: Tracks the pattern's phase and reports rate changes.
//! - **Pacer**: An owned interval timer whose period can be swapped in place.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    open-loop dispatch loop                   │
//! │                                                              │
//! │  ┌──────────────────┐  rate change   ┌──────────────────┐    │
//! │  │  RateController  │───────────────▶│      Pacer       │    │
//! │  │ (phase / random) │                │ (interval timer) │    │
//! │  └──────────────────┘                └──────────────────┘    │
//! │          ▲ observe(now_us)                   │ tick()        │
//! │          └───────────────────────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Patterns
//!
//! | Mode | Behaviour |
//! |------|-----------|
//! | disabled | Constant `requests_per_second` |
//! | `cycles` | Valley at `min_rate` for `valley_duration`, then peak at `max_rate` for `peak_duration`, repeating |
//! | `random` | Every `change_interval`, a new rate drawn uniformly from `[min_rate, max_rate]` |
//!
//! # DST Compatibility
//!
//! `RateController` accepts `now_us` as a parameter rather than reading the
//! clock, so phase logic is tested with controlled time. Only `Pacer` touches
//! the tokio timer.
//!
//! # Example
//!
//! ```rust
//! use surge_flow::{PatternMode, RateController, RatePatternConfig};
//!
//! let pattern = RatePatternConfig::cycles(10, 100, 2.0, 2.0);
//! let mut rng = rand::thread_rng();
//! let mut controller = RateController::new(50, &pattern, 0).unwrap();
//!
//! assert_eq!(controller.current_rate(), 10);
//! assert_eq!(controller.observe(2_000_000, &mut rng), Some(100));
//! assert_eq!(pattern.mode, PatternMode::Cycles);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod controller;
pub mod error;
pub mod pacer;
pub mod pattern;

// Re-export main types for convenience.
pub use controller::{Phase, RateController};
pub use error::{FlowError, FlowResult};
pub use pacer::{period_for_rate, Pacer};
pub use pattern::{PatternMode, RatePatternConfig};
