//! Error types for SeqFuse

use crate::time::Timestamp;
use thiserror::Error;

/// Result type alias for SeqFuse operations
pub type Result<T> = std::result::Result<T, Error>;

/// SeqFuse error types
///
/// Everything else the engines can signal travels as data inside the
/// [`PopResult`](crate::PopResult): expired waits and ordering violations are
/// discards, not errors, and not-ready estimator queries return a zero
/// duration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A push arrived with a receipt time behind the buffer's receipt
    /// high-water mark. The record was not enqueued and no state changed.
    #[error("receipt time {receipt} regresses behind high-water mark {high_water}")]
    OutOfOrderPush {
        receipt: Timestamp,
        high_water: Timestamp,
    },
}
