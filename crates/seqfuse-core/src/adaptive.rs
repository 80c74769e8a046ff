//! Adaptive minimal-latency release engine
//!
//! Per-source online estimators (period, latency) feed a release policy that
//! decides, on every pop, which queued measurements may leave, which must
//! still wait for a possibly-late sibling, and which have waited too long and
//! are discarded. A source only holds back releases while its most recent
//! receipt is recent enough that an older-than-released measurement from it
//! could still plausibly arrive; once that horizon has passed the source stops
//! constraining, which is what keeps the fast streams fast.

use crate::buffer::{assemble_pop, SequenceBuffer};
use crate::error::{Error, Result};
use crate::params::AdaptiveParams;
use crate::record::{DiscardReason, Measurement, PopResult, SourceId};
use crate::source::SourceState;
use crate::time::{Duration, Timestamp};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Reorders multi-source measurement streams into one globally
/// measurement-time-ordered stream with per-source adaptive waiting.
///
/// Only [`Mode::Single`](crate::Mode::Single) semantics are implemented;
/// `Batch` and `Match` configurations are accepted and currently behave the
/// same.
#[derive(Debug)]
pub struct AdaptiveBuffer<P> {
    params: AdaptiveParams,
    sources: HashMap<SourceId, SourceState<P>>,
    /// Source ids in first-seen order, for deterministic iteration.
    order: Vec<SourceId>,
    receipt_high_water: Option<Timestamp>,
    released_watermark: Option<Timestamp>,
}

impl<P> AdaptiveBuffer<P> {
    pub fn new(params: AdaptiveParams) -> Self {
        Self {
            params,
            sources: HashMap::new(),
            order: Vec::new(),
            receipt_high_water: None,
            released_watermark: None,
        }
    }

    pub fn params(&self) -> &AdaptiveParams {
        &self.params
    }

    /// Number of distinct sources seen so far.
    pub fn source_count(&self) -> usize {
        self.order.len()
    }

    /// Number of measurements currently queued across all sources.
    pub fn queued(&self) -> usize {
        self.sources.values().map(SourceState::queue_len).sum()
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

        let state = match self.sources.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(id);
                entry.insert(SourceState::new(&self.params))
            }
        };
        state.record_arrival(receipt_time, meas_time);
        state.enqueue(Measurement {
            id,
            receipt_time,
            meas_time,
            payload,
        });
        trace!(%id, %receipt_time, %meas_time, queued = state.queue_len(), "pushed");
        Ok(())
    }

    /// Release everything safe at `current_time`; see [`SequenceBuffer::pop`].
    pub fn pop(&mut self, current_time: Timestamp) -> PopResult<P> {
        let mut forced: Vec<(Measurement<P>, DiscardReason)> = Vec::new();

        // Queue heads that have dwelled past the wait cap leave as discards,
        // warm or not: the cap bounds the damage of a source that never warms
        // up or whose estimates have gone pathological.
        for id in &self.order {
            let state = self.sources.get_mut(id).expect("source in order map");
            let expired = state
                .head()
                .is_some_and(|head| current_time - head.receipt_time > self.params.max_wait_duration);
            if expired {
                let head = state.pop_head().expect("head checked above");
                debug!(
                    %id,
                    meas_time = %head.meas_time,
                    dwelled = %(current_time - head.receipt_time),
                    "discarding expired queue head"
                );
                forced.push((head, DiscardReason::ExpiredWait));
            }
        }

        // Safety watermark: the earliest measurement any possibly-late source
        // could still deliver. Sources past their wait horizon impose nothing.
        let mut safe_until: Option<Timestamp> = None;
        for id in &self.order {
            let state = self.sources.get(id).expect("source in order map");
            if state.constrains(current_time, &self.params) {
                let bound = state.earliest_unseen_meas(&self.params);
                safe_until = Some(match safe_until {
                    Some(current) => current.min(bound),
                    None => bound,
                });
            }
        }

        // Per-source FIFO fronts up to the watermark. Measurement times are
        // non-decreasing within a source, so draining the front is exhaustive.
        let mut candidates: Vec<Measurement<P>> = Vec::new();
        for id in &self.order {
            let state = self.sources.get_mut(id).expect("source in order map");
            while state
                .head()
                .is_some_and(|head| safe_until.map_or(true, |w| head.meas_time <= w))
            {
                candidates.push(state.pop_head().expect("head checked above"));
            }
        }

        trace!(
            %current_time,
            releasable = candidates.len(),
            expired = forced.len(),
            "pop"
        );
        assemble_pop(
            current_time,
            candidates,
            forced,
            &mut self.released_watermark,
        )
    }

    /// Estimated mean inter-measurement period of `id`; zero until warm.
    pub fn estimated_period(&self, id: SourceId) -> Duration {
        self.ready_source(id)
            .map(|s| s.period().mean())
            .unwrap_or(Duration::ZERO)
    }

    /// Standard deviation companion to [`estimated_period`](Self::estimated_period).
    pub fn estimated_period_stddev(&self, id: SourceId) -> Duration {
        self.ready_source(id)
            .map(|s| s.period().stddev())
            .unwrap_or(Duration::ZERO)
    }

    /// The `q`-quantile of the period distribution of `id`; zero until warm.
    pub fn estimated_period_jitter(&self, id: SourceId, q: f64) -> Duration {
        self.ready_source(id)
            .map(|s| s.period().quantile(q))
            .unwrap_or(Duration::ZERO)
    }

    /// Estimated mean latency (receipt minus measurement time) of `id`; zero
    /// until warm. Never negative: negative samples contribute zero.
    pub fn estimated_latency(&self, id: SourceId) -> Duration {
        self.ready_source(id)
            .map(|s| s.latency().mean())
            .unwrap_or(Duration::ZERO)
    }

    /// Standard deviation companion to [`estimated_latency`](Self::estimated_latency).
    pub fn estimated_latency_stddev(&self, id: SourceId) -> Duration {
        self.ready_source(id)
            .map(|s| s.latency().stddev())
            .unwrap_or(Duration::ZERO)
    }

    /// The `q`-quantile of the latency distribution of `id`; zero until warm.
    pub fn estimated_latency_jitter(&self, id: SourceId, q: f64) -> Duration {
        self.ready_source(id)
            .map(|s| s.latency().quantile(q))
            .unwrap_or(Duration::ZERO)
    }

    fn ready_source(&self, id: SourceId) -> Option<&SourceState<P>> {
        self.sources.get(&id).filter(|s| s.is_warm())
    }
}

impl<P> SequenceBuffer<P> for AdaptiveBuffer<P> {
    fn push(
        &mut self,
        id: SourceId,
        receipt_time: Timestamp,
        meas_time: Timestamp,
        payload: P,
    ) -> Result<()> {
        AdaptiveBuffer::push(self, id, receipt_time, meas_time, payload)
    }

    fn pop(&mut self, current_time: Timestamp) -> PopResult<P> {
        AdaptiveBuffer::pop(self, current_time)
    }

    fn queued(&self) -> usize {
        AdaptiveBuffer::queued(self)
    }
}
