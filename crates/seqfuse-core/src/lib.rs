//! SeqFuse Core
//!
//! Minimal-latency fusion buffering for multi-sensor streams whose
//! measurements arrive out of order with variable end-to-end latency.
//!
//! This crate provides:
//! - The adaptive release engine ([`AdaptiveBuffer`]): per-source online
//!   period/latency estimators plus a release policy that waits exactly as
//!   long as a late sibling is statistically worth waiting for
//! - A fixed-lag reference engine ([`FixedLagBuffer`]) with the identical
//!   output shape
//! - Timing primitives ([`Timestamp`], [`Duration`]) with microsecond
//!   canonical precision
//! - Sliding-window statistics ([`stats::SlidingStats`])
//! - The value objects crossing the boundary ([`PopResult`],
//!   [`ReleasedRecord`]), all serde value types
//!
//! The buffers are single-threaded and cooperative: one logical consumer
//! interleaves `push` and `pop`, nothing suspends, and all progress happens
//! inside `pop`. Inputs must arrive in non-decreasing receipt time; outputs
//! are globally non-decreasing in measurement time across the lifetime of a
//! buffer.

pub mod adaptive;
pub mod buffer;
pub mod error;
pub mod fixed_lag;
pub mod params;
pub mod record;
mod source;
pub mod stats;
pub mod time;

pub use adaptive::AdaptiveBuffer;
pub use buffer::SequenceBuffer;
pub use error::{Error, Result};
pub use fixed_lag::FixedLagBuffer;
pub use params::{AdaptiveParams, FixedLagParams, Mode};
pub use record::{DiscardReason, DiscardedRecord, Measurement, PopResult, ReleasedRecord, SourceId};
pub use time::{Duration, Timestamp};

/// Default sliding-window size of the per-source estimators.
pub const DEFAULT_HISTORY_SIZE: usize = 1024;

/// Default number of samples a source must deliver before its estimates
/// influence release decisions.
pub const DEFAULT_WARMUP_THRESHOLD: usize = 32;

/// Default upper quantile used when turning a distribution into a deadline.
pub const DEFAULT_JITTER_QUANTILE: f64 = 0.99;
