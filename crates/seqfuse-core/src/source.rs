//! Per-source stream state
//!
//! One [`SourceState`] per stream identity: the FIFO of measurements awaiting
//! release, the period and latency estimators fed on every push, and the
//! derived classification (cold / warm / stale) the release engine consults.

use crate::params::AdaptiveParams;
use crate::record::Measurement;
use crate::stats::SlidingStats;
use crate::time::{Duration, Timestamp};
use std::collections::VecDeque;

/// A source is stale once this many wait caps have elapsed since its last
/// receipt; stale sources stop constraining releases entirely.
const STALE_FACTOR: i64 = 10;

#[derive(Debug, Clone)]
pub struct SourceState<P> {
    queue: VecDeque<Measurement<P>>,
    period_est: SlidingStats,
    latency_est: SlidingStats,
    samples_seen: u64,
    last_receipt: Timestamp,
    last_meas: Timestamp,
}

impl<P> SourceState<P> {
    pub(crate) fn new(params: &AdaptiveParams) -> Self {
        Self {
            queue: VecDeque::new(),
            period_est: SlidingStats::new(params.history_size, params.warmup_threshold),
            latency_est: SlidingStats::new(params.history_size, params.warmup_threshold),
            samples_seen: 0,
            last_receipt: Timestamp::EPOCH,
            last_meas: Timestamp::EPOCH,
        }
    }

    /// Feed one arrival into the estimators. The first sample only seeds the
    /// reference times; there is no difference to observe yet.
    pub(crate) fn record_arrival(&mut self, receipt_time: Timestamp, meas_time: Timestamp) {
        if self.samples_seen > 0 {
            self.period_est.observe(meas_time - self.last_meas);
            // a measurement stamped after its own receipt contributes zero latency
            self.latency_est
                .observe((receipt_time - meas_time).clamp_min_zero());
        }
        self.last_receipt = receipt_time;
        self.last_meas = meas_time;
        self.samples_seen += 1;
    }

    pub(crate) fn enqueue(&mut self, measurement: Measurement<P>) {
        self.queue.push_back(measurement);
    }

    pub(crate) fn head(&self) -> Option<&Measurement<P>> {
        self.queue.front()
    }

    pub(crate) fn pop_head(&mut self) -> Option<Measurement<P>> {
        self.queue.pop_front()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub(crate) fn last_receipt(&self) -> Timestamp {
        self.last_receipt
    }

    pub(crate) fn period(&self) -> &SlidingStats {
        &self.period_est
    }

    pub(crate) fn latency(&self) -> &SlidingStats {
        &self.latency_est
    }

    /// Whether the estimators have seen enough samples to be trusted.
    pub(crate) fn is_warm(&self) -> bool {
        self.period_est.ready() && self.latency_est.ready()
    }

    pub(crate) fn is_stale(&self, now: Timestamp, max_jitter: Duration) -> bool {
        now - self.last_receipt > max_jitter.saturating_mul(STALE_FACTOR)
    }

    /// How long after its last receipt this source may still hold back
    /// releases: the time by which the next, still-unseen measurement has
    /// arrived with confidence `jitter_quantile`, capped by `max_jitter`.
    pub(crate) fn wait_tolerance(&self, params: &AdaptiveParams) -> Duration {
        let horizon = self.period_est.quantile(params.jitter_quantile)
            + self.latency_est.quantile(params.jitter_quantile);
        horizon.min(params.max_jitter)
    }

    /// True while an older-than-released measurement from this source could
    /// still plausibly arrive, which is when it must constrain the release
    /// watermark. Cold sources always constrain (conservative warmup); stale
    /// sources never do.
    pub(crate) fn constrains(&self, now: Timestamp, params: &AdaptiveParams) -> bool {
        if self.is_stale(now, params.max_jitter) {
            return false;
        }
        if !self.is_warm() {
            return true;
        }
        now - self.last_receipt <= self.wait_tolerance(params)
    }

    /// Lower bound on the measurement time of the next record this source has
    /// not delivered yet. Cold sources bound at their last seen measurement;
    /// warm sources add one period minus its upper-tail jitter.
    pub(crate) fn earliest_unseen_meas(&self, params: &AdaptiveParams) -> Timestamp {
        if !self.is_warm() {
            return self.last_meas;
        }
        let step = (self.period_est.mean() - self.period_est.tail(params.jitter_quantile))
            .clamp_min_zero();
        self.last_meas + step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceId;

    fn params() -> AdaptiveParams {
        AdaptiveParams::default().with_warmup_threshold(4)
    }

    fn push(state: &mut SourceState<()>, receipt_ms: i64, meas_ms: i64) {
        let receipt = Timestamp::from_epoch_millis(receipt_ms);
        let meas = Timestamp::from_epoch_millis(meas_ms);
        state.record_arrival(receipt, meas);
        state.enqueue(Measurement {
            id: SourceId(0),
            receipt_time: receipt,
            meas_time: meas,
            payload: (),
        });
    }

    #[test]
    fn first_sample_only_seeds_reference_times() {
        let p = params();
        let mut state: SourceState<()> = SourceState::new(&p);
        push(&mut state, 60, 50);
        assert_eq!(state.samples_seen(), 1);
        assert_eq!(state.period().count(), 0);
        assert_eq!(state.latency().count(), 0);
        assert_eq!(state.last_receipt(), Timestamp::from_epoch_millis(60));
    }

    #[test]
    fn later_samples_feed_both_estimators() {
        let p = params();
        let mut state: SourceState<()> = SourceState::new(&p);
        for k in 0..5 {
            push(&mut state, 60 + k * 50, 50 + k * 50);
        }
        assert_eq!(state.period().count(), 4);
        assert_eq!(state.period().mean(), Duration::from_millis(50));
        assert_eq!(state.latency().mean(), Duration::from_millis(10));
        assert!(state.is_warm());
    }

    #[test]
    fn negative_latency_is_clamped() {
        let p = params();
        let mut state: SourceState<()> = SourceState::new(&p);
        push(&mut state, 50, 50);
        // measurement stamped 10ms after its receipt
        push(&mut state, 100, 110);
        assert_eq!(state.latency().mean(), Duration::ZERO);
    }

    #[test]
    fn cold_source_bounds_at_last_measurement() {
        let p = params();
        let mut state: SourceState<()> = SourceState::new(&p);
        push(&mut state, 60, 50);
        assert!(!state.is_warm());
        assert!(state.constrains(Timestamp::from_epoch_millis(60), &p));
        assert_eq!(
            state.earliest_unseen_meas(&p),
            Timestamp::from_epoch_millis(50)
        );
    }

    #[test]
    fn warm_source_predicts_one_period_ahead() {
        let p = params();
        let mut state: SourceState<()> = SourceState::new(&p);
        for k in 0..6 {
            push(&mut state, 60 + k * 50, 50 + k * 50);
        }
        // zero jitter: the next unseen measurement is exactly one period out
        assert_eq!(
            state.earliest_unseen_meas(&p),
            Timestamp::from_epoch_millis(50 + 5 * 50 + 50)
        );
    }

    #[test]
    fn warm_source_stops_constraining_past_its_tolerance() {
        let p = params();
        let mut state: SourceState<()> = SourceState::new(&p);
        for k in 0..6 {
            push(&mut state, 60 + k * 50, 50 + k * 50);
        }
        // tolerance with zero jitter: period q99 + latency q99 = 50ms + 10ms
        let last_receipt = Timestamp::from_epoch_millis(60 + 5 * 50);
        assert!(state.constrains(last_receipt + Duration::from_millis(60), &p));
        assert!(!state.constrains(last_receipt + Duration::from_millis(61), &p));
    }

    #[test]
    fn distant_past_receipt_goes_stale() {
        let p = params().with_max_jitter(Duration::from_millis(100));
        let mut state: SourceState<()> = SourceState::new(&p);
        push(&mut state, 60, 50);
        let now = Timestamp::from_epoch_millis(60) + Duration::from_millis(1001);
        assert!(state.is_stale(now, p.max_jitter));
        assert!(!state.constrains(now, &p));
    }
}
