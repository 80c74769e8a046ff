//! Fixed-lag reference engine
//!
//! Releases every measurement once a constant lag has elapsed since its
//! receipt. No per-source estimation and no discards beyond those the global
//! monotonicity guard forces; the engine exists to make the adaptive buffer's
//! contract precise by contrast and shares its output shape exactly.

use crate::buffer::{assemble_pop, SequenceBuffer};
use crate::error::{Error, Result};
use crate::params::FixedLagParams;
use crate::record::{Measurement, PopResult, SourceId};
use crate::time::{Duration, Timestamp};
use std::collections::VecDeque;
use tracing::trace;

/// Baseline buffer releasing by `current_time - lag`.
#[derive(Debug)]
pub struct FixedLagBuffer<P> {
    lag: Duration,
    /// Receipt-ordered by the push contract, so the releasable prefix is
    /// always at the front.
    queue: VecDeque<Measurement<P>>,
    receipt_high_water: Option<Timestamp>,
    released_watermark: Option<Timestamp>,
}

impl<P> FixedLagBuffer<P> {
    pub fn new(params: FixedLagParams) -> Self {
        Self {
            lag: params.lag(),
            queue: VecDeque::new(),
            receipt_high_water: None,
            released_watermark: None,
        }
    }

    /// The effective lag the configuration resolved to.
    pub fn lag(&self) -> Duration {
        self.lag
    }

    /// Number of measurements currently queued.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue one measurement; see [`SequenceBuffer::push`].
    pub fn push(
        &mut self,
        id: SourceId,
        receipt_time: Timestamp,
        meas_time: Timestamp,
        payload: P,
    ) -> Result<()> {
        if let Some(high_water) = self.receipt_high_water {
            if receipt_time < high_water {
                return Err(Error::OutOfOrderPush {
                    receipt: receipt_time,
                    high_water,
                });
            }
        }
        self.receipt_high_water = Some(receipt_time);
        self.queue.push_back(Measurement {
            id,
            receipt_time,
            meas_time,
            payload,
        });
        Ok(())
    }

    /// Release everything received at or before `current_time - lag`.
    pub fn pop(&mut self, current_time: Timestamp) -> PopResult<P> {
        let deadline = current_time - self.lag;
        let mut candidates: Vec<Measurement<P>> = Vec::new();
        while self
            .queue
            .front()
            .is_some_and(|head| head.receipt_time <= deadline)
        {
            candidates.push(self.queue.pop_front().expect("head checked above"));
        }
        trace!(%current_time, %deadline, releasable = candidates.len(), "pop");
        assemble_pop(
            current_time,
            candidates,
            Vec::new(),
            &mut self.released_watermark,
        )
    }
}

impl<P> SequenceBuffer<P> for FixedLagBuffer<P> {
    fn push(
        &mut self,
        id: SourceId,
        receipt_time: Timestamp,
        meas_time: Timestamp,
        payload: P,
    ) -> Result<()> {
        FixedLagBuffer::push(self, id, receipt_time, meas_time, payload)
    }

    fn pop(&mut self, current_time: Timestamp) -> PopResult<P> {
        FixedLagBuffer::pop(self, current_time)
    }

    fn queued(&self) -> usize {
        FixedLagBuffer::queued(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: i64) -> Timestamp {
        Timestamp::from_epoch_millis(v)
    }

    #[test]
    fn holds_records_younger_than_lag() {
        let mut buffer: FixedLagBuffer<()> =
            FixedLagBuffer::new(FixedLagParams::Lag(Duration::from_millis(100)));
        buffer.push(SourceId(0), ms(50), ms(40), ()).unwrap();
        assert!(buffer.pop(ms(149)).is_empty());
        assert_eq!(buffer.queued(), 1);
        let res = buffer.pop(ms(150));
        assert_eq!(res.data.len(), 1);
        assert_eq!(buffer.queued(), 0);
    }

    #[test]
    fn rejects_receipt_regression() {
        let mut buffer: FixedLagBuffer<()> =
            FixedLagBuffer::new(FixedLagParams::Lag(Duration::from_millis(10)));
        buffer.push(SourceId(0), ms(100), ms(90), ()).unwrap();
        assert!(buffer.push(SourceId(0), ms(99), ms(91), ()).is_err());
        assert_eq!(buffer.queued(), 1);
    }
}
