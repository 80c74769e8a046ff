//! The engine surface shared by both buffer implementations
//!
//! Both the adaptive and the fixed-lag engine accept the same push contract
//! and assemble their pop results the same way; harnesses stay generic over
//! [`SequenceBuffer`] and compare outputs shape-for-shape.

use crate::error::Result;
use crate::record::{
    DiscardReason, DiscardedRecord, Measurement, PopResult, ReleasedRecord, SourceId,
};
use crate::time::Timestamp;
use tracing::debug;

/// A buffer a single logical consumer drains with interleaved `push`/`pop`
/// calls. No operation suspends; all progress happens inside `pop`.
pub trait SequenceBuffer<P> {
    /// Enqueue one measurement. Fails (without state change) when
    /// `receipt_time` regresses behind the buffer-wide receipt high-water
    /// mark; equal receipt times are accepted in push order.
    fn push(
        &mut self,
        id: SourceId,
        receipt_time: Timestamp,
        meas_time: Timestamp,
        payload: P,
    ) -> Result<()>;

    /// Release everything that is safe at `current_time`. Never fails; an
    /// all-quiet buffer returns an empty result.
    fn pop(&mut self, current_time: Timestamp) -> PopResult<P>;

    /// Number of measurements currently queued across all sources.
    fn queued(&self) -> usize;
}

/// Turn this pop's release candidates and forced discards into an ordered
/// [`PopResult`], applying the released-watermark guard and the span
/// annotations, and advancing the watermark over what was actually released.
pub(crate) fn assemble_pop<P>(
    buffer_time: Timestamp,
    mut candidates: Vec<Measurement<P>>,
    forced_discards: Vec<(Measurement<P>, DiscardReason)>,
    watermark: &mut Option<Timestamp>,
) -> PopResult<P> {
    if candidates.is_empty() && forced_discards.is_empty() {
        return PopResult::empty(buffer_time);
    }

    candidates.sort_by(Measurement::cmp_release_order);

    let mut released: Vec<Measurement<P>> = Vec::with_capacity(candidates.len());
    let mut discards = forced_discards;
    for measurement in candidates {
        match *watermark {
            Some(mark) if measurement.meas_time < mark => {
                debug!(
                    id = %measurement.id,
                    meas_time = %measurement.meas_time,
                    watermark = %mark,
                    "discarding measurement older than released watermark"
                );
                discards.push((measurement, DiscardReason::OutOfOrderAtRelease));
            }
            _ => {
                *watermark = Some(measurement.meas_time);
                released.push(measurement);
            }
        }
    }

    let earliest_meas_time = released
        .iter()
        .map(|m| m.meas_time)
        .chain(discards.iter().map(|(m, _)| m.meas_time))
        .min()
        .expect("at least one record in this pop");
    let latest_receipt_time = released
        .iter()
        .map(|m| m.receipt_time)
        .chain(discards.iter().map(|(m, _)| m.receipt_time))
        .max()
        .expect("at least one record in this pop");

    let annotate = |m: Measurement<P>| ReleasedRecord {
        id: m.id,
        meas_time: m.meas_time,
        receipt_time: m.receipt_time,
        earliest_meas_time,
        latest_receipt_time,
        payload: m.payload,
    };

    let data: Vec<ReleasedRecord<P>> = released.into_iter().map(annotate).collect();
    let mut discarded_data: Vec<DiscardedRecord<P>> = discards
        .into_iter()
        .map(|(m, reason)| DiscardedRecord {
            record: annotate(m),
            reason,
        })
        .collect();
    discarded_data.sort_by(|a, b| {
        (a.record.meas_time, a.record.receipt_time, a.record.id).cmp(&(
            b.record.meas_time,
            b.record.receipt_time,
            b.record.id,
        ))
    });

    PopResult {
        buffer_time,
        data,
        discarded_data,
    }
}
