//! Value objects crossing the buffer boundary
//!
//! Everything here is a plain serde value type so parameter and result sets
//! can be shipped between Monte-Carlo workers by value.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Opaque stream identity. Two pushes with the same id belong to the same
/// stream; the buffer attaches no other meaning to the value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A queued record: what the producer pushed, before any release decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement<P> {
    pub id: SourceId,
    /// When the record entered the buffer.
    pub receipt_time: Timestamp,
    /// When the physical event the record describes happened.
    pub meas_time: Timestamp,
    /// Producer payload; never inspected by the buffer.
    pub payload: P,
}

impl<P> Measurement<P> {
    /// Sort key used for every released or discarded sequence: measurement
    /// time, then receipt time, then source id.
    pub(crate) fn sort_key(&self) -> (Timestamp, Timestamp, SourceId) {
        (self.meas_time, self.receipt_time, self.id)
    }

    pub(crate) fn cmp_release_order(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A record leaving the buffer, annotated with the span of the pop that
/// carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasedRecord<P> {
    pub id: SourceId,
    pub meas_time: Timestamp,
    pub receipt_time: Timestamp,
    /// Smallest measurement time among all records released or discarded in
    /// the same pop.
    pub earliest_meas_time: Timestamp,
    /// Largest receipt time among all records released or discarded in the
    /// same pop.
    pub latest_receipt_time: Timestamp,
    pub payload: P,
}

/// Why a record was discarded instead of released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscardReason {
    /// The record sat at the head of its queue longer than the configured
    /// maximum wait.
    ExpiredWait,
    /// Releasing the record would have regressed the released measurement-time
    /// watermark.
    OutOfOrderAtRelease,
}

/// A record the buffer gave up on, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardedRecord<P> {
    pub record: ReleasedRecord<P>,
    pub reason: DiscardReason,
}

/// Result of a single `pop`: the records now safe to release and the records
/// discarded while deciding, both ordered by measurement time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopResult<P> {
    /// The `current_time` the consumer popped at.
    pub buffer_time: Timestamp,
    pub data: Vec<ReleasedRecord<P>>,
    pub discarded_data: Vec<DiscardedRecord<P>>,
}

impl<P> PopResult<P> {
    pub(crate) fn empty(buffer_time: Timestamp) -> Self {
        Self {
            buffer_time,
            data: Vec::new(),
            discarded_data: Vec::new(),
        }
    }

    /// True when the pop neither released nor discarded anything.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.discarded_data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn meas(id: u32, receipt_ms: i64, meas_ms: i64) -> Measurement<()> {
        Measurement {
            id: SourceId(id),
            receipt_time: Timestamp::from_epoch_millis(receipt_ms),
            meas_time: Timestamp::from_epoch_millis(meas_ms),
            payload: (),
        }
    }

    #[test]
    fn release_order_breaks_ties_by_receipt_then_id() {
        let a = meas(1, 20, 10);
        let b = meas(0, 30, 10);
        let c = meas(1, 30, 10);
        assert_eq!(a.cmp_release_order(&b), Ordering::Less);
        assert_eq!(b.cmp_release_order(&c), Ordering::Less);
        assert_eq!(c.cmp_release_order(&c), Ordering::Equal);
    }

    #[test]
    fn empty_pop_result() {
        let res: PopResult<()> = PopResult::empty(Timestamp::from_epoch_millis(5));
        assert!(res.is_empty());
        assert_eq!(res.buffer_time, Timestamp::from_epoch_millis(5));
    }
}
