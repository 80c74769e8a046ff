//! Engine configuration
//!
//! Parameter sets are plain serde values with the defaults the engines were
//! evaluated with, so a whole configuration can be copied into a worker or
//! logged verbatim.

use crate::stats::probit;
use crate::time::Duration;
use serde::{Deserialize, Serialize};

/// Release mode of the adaptive engine.
///
/// Only `Single` semantics are implemented; `Batch` and `Match` are accepted
/// at construction and currently behave as `Single`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Release each measurement individually as soon as it is safe.
    #[default]
    Single,
    /// Release aligned batches of measurements.
    Batch,
    /// Release matched tuples across sources.
    Match,
}

/// Configuration of the adaptive release engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParams {
    pub mode: Mode,
    /// Upper quantile used when turning an estimated distribution into a
    /// waiting deadline.
    pub jitter_quantile: f64,
    /// Cap on the wait any single source may impose. The default is an
    /// effectively infinite sentinel; the cap is a safety net against
    /// pathological estimators, not a tuning knob.
    pub max_jitter: Duration,
    /// Quantile companion to `max_wait_duration`, kept for parameter
    /// compatibility with recorded configurations.
    pub max_wait_duration_quantile: f64,
    /// Cap on how long any one measurement may sit at the head of its queue
    /// before being discarded as expired.
    pub max_wait_duration: Duration,
    /// Samples a source must deliver before its estimates influence release
    /// decisions.
    pub warmup_threshold: usize,
    /// Sliding-window size of the per-source estimators.
    pub history_size: usize,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            mode: Mode::Single,
            jitter_quantile: crate::DEFAULT_JITTER_QUANTILE,
            max_jitter: Duration::from_millis(10_000_000),
            max_wait_duration_quantile: crate::DEFAULT_JITTER_QUANTILE,
            max_wait_duration: Duration::from_millis(1_000_000),
            warmup_threshold: crate::DEFAULT_WARMUP_THRESHOLD,
            history_size: crate::DEFAULT_HISTORY_SIZE,
        }
    }
}

impl AdaptiveParams {
    /// Set the release mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the deadline quantile.
    pub fn with_jitter_quantile(mut self, q: f64) -> Self {
        self.jitter_quantile = q;
        self
    }

    /// Set the per-source wait cap.
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Set the head-of-queue dwell cap.
    pub fn with_max_wait_duration(mut self, max_wait: Duration) -> Self {
        self.max_wait_duration = max_wait;
        self
    }

    /// Set the warmup sample count.
    pub fn with_warmup_threshold(mut self, warmup: usize) -> Self {
        self.warmup_threshold = warmup;
        self
    }

    /// Set the estimator window size.
    pub fn with_history_size(mut self, history: usize) -> Self {
        self.history_size = history;
        self
    }
}

/// Configuration of the fixed-lag reference engine: either a constant lag, or
/// a lag derived from an assumed normal delay distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedLagParams {
    /// Release everything received at least `lag` ago.
    Lag(Duration),
    /// `lag = delay_mean + probit(delay_quantile) * delay_stddev`.
    Derived {
        delay_mean: Duration,
        delay_stddev: Duration,
        delay_quantile: f64,
    },
}

impl FixedLagParams {
    /// The effective lag this configuration resolves to.
    pub fn lag(&self) -> Duration {
        match *self {
            FixedLagParams::Lag(lag) => lag,
            FixedLagParams::Derived {
                delay_mean,
                delay_stddev,
                delay_quantile,
            } => delay_mean + delay_stddev.mul_f64(probit(delay_quantile)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_defaults() {
        let params = AdaptiveParams::default();
        assert_eq!(params.mode, Mode::Single);
        assert_eq!(params.jitter_quantile, 0.99);
        assert_eq!(params.max_jitter, Duration::from_millis(10_000_000));
        assert_eq!(params.max_wait_duration, Duration::from_millis(1_000_000));
        assert_eq!(params.warmup_threshold, 32);
        assert_eq!(params.history_size, 1024);
    }

    #[test]
    fn builder_overrides() {
        let params = AdaptiveParams::default()
            .with_mode(Mode::Batch)
            .with_warmup_threshold(8)
            .with_history_size(64)
            .with_max_wait_duration(Duration::from_millis(500));
        assert_eq!(params.mode, Mode::Batch);
        assert_eq!(params.warmup_threshold, 8);
        assert_eq!(params.history_size, 64);
        assert_eq!(params.max_wait_duration, Duration::from_millis(500));
    }

    #[test]
    fn constant_lag_passes_through() {
        let params = FixedLagParams::Lag(Duration::from_millis_f64(123.38));
        assert_eq!(params.lag(), Duration::from_micros(123_380));
    }

    #[test]
    fn derived_lag_uses_inverse_normal_cdf() {
        let params = FixedLagParams::Derived {
            delay_mean: Duration::from_millis(100),
            delay_stddev: Duration::from_millis(10),
            delay_quantile: 0.995,
        };
        // 100ms + 2.5758...sigma * 10ms
        let lag = params.lag().as_micros();
        assert!((lag - 125_758).abs() <= 2, "lag was {lag}us");
    }

    #[test]
    fn median_quantile_derives_plain_mean() {
        let params = FixedLagParams::Derived {
            delay_mean: Duration::from_millis(100),
            delay_stddev: Duration::from_millis(10),
            delay_quantile: 0.5,
        };
        assert_eq!(params.lag(), Duration::from_millis(100));
    }
}
