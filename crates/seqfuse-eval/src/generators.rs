//! Synthetic measurement generators
//!
//! Each generator models one sensor: measurements every `period` with
//! Gaussian jitter, delivered after a Gaussian latency clamped at zero, with
//! an optional drop model that swallows whole periods. Generators are polled
//! with the evaluation clock and yield at most one record per poll, exactly
//! like a receipt-ordered replay would.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use seqfuse_core::{Duration, Timestamp};
use serde::{Deserialize, Serialize};

/// Drops only start once a generator has produced this many records, so every
/// source warms the buffer up before gaps appear.
const DROP_GRACE_STEPS: u64 = 10;

/// Statistical profile of one synthetic sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Mean inter-measurement period.
    pub period: Duration,
    pub period_stddev: Duration,
    /// Mean end-to-end latency (receipt minus measurement time).
    pub latency: Duration,
    pub latency_stddev: Duration,
    /// Probability that a measurement is swallowed; each swallow repeats.
    pub drop_rate: f64,
    /// Track period noise separately so synchronized generators do not drift
    /// apart over a long run.
    pub run_in_sync: bool,
    /// Shift of the first measurement relative to the scenario start.
    pub initial_phase_offset: Option<Duration>,
}

impl SourceProfile {
    pub fn new(period: Duration, latency: Duration) -> Self {
        Self {
            period,
            period_stddev: Duration::ZERO,
            latency,
            latency_stddev: Duration::ZERO,
            drop_rate: 0.0,
            run_in_sync: false,
            initial_phase_offset: None,
        }
    }

    pub fn with_period_stddev(mut self, stddev: Duration) -> Self {
        self.period_stddev = stddev;
        self
    }

    pub fn with_latency_stddev(mut self, stddev: Duration) -> Self {
        self.latency_stddev = stddev;
        self
    }

    pub fn with_drop_rate(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate;
        self
    }

    pub fn with_phase_offset(mut self, offset: Duration) -> Self {
        self.initial_phase_offset = Some(offset);
        self
    }
}

/// One sensor worth of synthetic measurements.
#[derive(Debug, Clone)]
pub struct MeasurementGenerator {
    profile: SourceProfile,
    rng: StdRng,
    period_noise: Normal<f64>,
    latency_dist: Normal<f64>,
    meas_time: Timestamp,
    /// Period noise of the pending record when running in sync mode.
    meas_noise: Duration,
    receipt_time: Timestamp,
    step: u64,
}

impl MeasurementGenerator {
    /// New generator starting at `init_time`, deterministic for a given seed.
    pub fn new(profile: SourceProfile, init_time: Timestamp, seed: u64) -> Self {
        assert!(
            (0.0..1.0).contains(&profile.drop_rate),
            "drop rate must be in [0, 1)"
        );
        let period_noise = Normal::new(0.0, profile.period_stddev.as_micros() as f64)
            .expect("period stddev is non-negative");
        let latency_dist = Normal::new(
            profile.latency.as_micros() as f64,
            profile.latency_stddev.as_micros() as f64,
        )
        .expect("latency stddev is non-negative");

        let mut start = init_time;
        if let Some(offset) = profile.initial_phase_offset {
            start = start + offset;
        }
        let mut generator = Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
            period_noise,
            latency_dist,
            meas_time: start,
            meas_noise: Duration::ZERO,
            receipt_time: start,
            step: 0,
        };
        generator.advance();
        generator
    }

    /// The record received before `query_time`, if any. At most one per poll;
    /// poll faster than the source measures.
    pub fn next_before(&mut self, query_time: Timestamp) -> Option<(Timestamp, Timestamp)> {
        if self.receipt_time < query_time {
            let record = (self.meas_time + self.meas_noise, self.receipt_time);
            self.advance();
            Some(record)
        } else {
            None
        }
    }

    fn advance(&mut self) {
        self.step += 1;
        let mut skipped_periods = 1i64;
        if self.step > DROP_GRACE_STEPS {
            while self.rng.random::<f64>() < self.profile.drop_rate {
                skipped_periods += 1;
            }
        }

        let jitter =
            Duration::from_micros(self.period_noise.sample(&mut self.rng).round() as i64);
        if self.profile.run_in_sync {
            self.meas_time += self.profile.period.saturating_mul(skipped_periods);
            self.meas_noise = jitter;
        } else {
            self.meas_time +=
                (self.profile.period.saturating_mul(skipped_periods) + jitter).clamp_min_zero();
            self.meas_noise = Duration::ZERO;
        }

        // latency rides on the noise-free schedule; in sync mode a large noise
        // sample can stamp a measurement after its own receipt, which the
        // buffer clamps to zero latency
        let latency = self.latency_dist.sample(&mut self.rng).max(0.0);
        self.receipt_time = self.meas_time + Duration::from_micros(latency.round() as i64);
    }
}

/// The consumer's fixed-period pop clock.
#[derive(Debug, Clone)]
pub struct PopClock {
    period: Duration,
    time: Timestamp,
}

impl PopClock {
    pub fn new(period: Duration, init_time: Timestamp) -> Self {
        Self {
            period,
            time: init_time,
        }
    }
}

impl Iterator for PopClock {
    type Item = Timestamp;

    fn next(&mut self) -> Option<Timestamp> {
        self.time += self.period;
        Some(self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: i64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn zero_jitter_generator_is_exactly_periodic() {
        let profile = SourceProfile::new(ms(50), ms(15));
        let mut generator = MeasurementGenerator::new(profile, Timestamp::EPOCH, 1);

        let mut records = Vec::new();
        let mut clock = PopClock::new(ms(1), Timestamp::EPOCH);
        for _ in 0..300 {
            let now = clock.next().expect("clock never ends");
            if let Some(record) = generator.next_before(now) {
                records.push(record);
            }
        }

        assert!(!records.is_empty());
        for (k, (meas, receipt)) in records.iter().enumerate() {
            let expected = Timestamp::from_epoch_millis(50 * (k as i64 + 1));
            assert_eq!(*meas, expected);
            assert_eq!(*receipt, expected + ms(15));
        }
    }

    #[test]
    fn phase_offset_shifts_the_whole_stream() {
        let profile = SourceProfile::new(ms(50), ms(0)).with_phase_offset(ms(7));
        let mut generator = MeasurementGenerator::new(profile, Timestamp::EPOCH, 1);
        let record = generator
            .next_before(Timestamp::from_epoch_millis(200))
            .expect("first record due");
        assert_eq!(record.0, Timestamp::from_epoch_millis(57));
    }

    #[test]
    fn jittered_streams_stay_well_formed() {
        let profile = SourceProfile::new(ms(20), ms(10))
            .with_period_stddev(ms(2))
            .with_latency_stddev(ms(3))
            .with_drop_rate(0.1);
        let mut generator = MeasurementGenerator::new(profile, Timestamp::EPOCH, 42);

        let mut clock = PopClock::new(ms(1), Timestamp::EPOCH);
        let mut last_meas = None;
        for _ in 0..5_000 {
            let now = clock.next().expect("clock never ends");
            if let Some((meas, receipt)) = generator.next_before(now) {
                assert!(receipt <= now);
                assert!(receipt >= meas, "latency cannot be negative");
                if let Some(prev) = last_meas {
                    assert!(meas >= prev, "measurement times regressed");
                }
                last_meas = Some(meas);
            }
        }
    }

    #[test]
    fn same_seed_reproduces_the_stream() {
        let profile = SourceProfile::new(ms(20), ms(10))
            .with_period_stddev(ms(2))
            .with_latency_stddev(ms(3));
        let mut a = MeasurementGenerator::new(profile, Timestamp::EPOCH, 7);
        let mut b = MeasurementGenerator::new(profile, Timestamp::EPOCH, 7);
        let horizon = Timestamp::from_epoch_millis(10_000);
        for _ in 0..100 {
            assert_eq!(a.next_before(horizon), b.next_before(horizon));
        }
    }

    #[test]
    fn drops_lengthen_some_gaps_to_whole_periods() {
        let profile = SourceProfile::new(ms(10), ms(2)).with_drop_rate(0.3);
        let mut generator = MeasurementGenerator::new(profile, Timestamp::EPOCH, 99);

        let mut clock = PopClock::new(ms(1), Timestamp::EPOCH);
        let mut meas_times = Vec::new();
        for _ in 0..20_000 {
            let now = clock.next().expect("clock never ends");
            if let Some((meas, _)) = generator.next_before(now) {
                meas_times.push(meas);
            }
        }
        let has_gap = meas_times
            .windows(2)
            .any(|pair| pair[1] - pair[0] >= ms(20));
        assert!(has_gap, "expected at least one dropped period");
        // gaps are whole multiples of the period
        for pair in meas_times.windows(2) {
            let gap = (pair[1] - pair[0]).as_micros();
            assert_eq!(gap % 10_000, 0, "gap {gap}us is not a period multiple");
        }
    }
}
