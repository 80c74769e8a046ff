//! Release statistics over recorded runs
//!
//! The same summaries the published evaluation prints: per-source drop rates,
//! release-delay distributions and record accounting.

use crate::scenario::RunData;
use seqfuse_core::{Duration, SourceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Summary of one delay distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaySummary {
    pub count: usize,
    pub mean: Duration,
    pub median: Duration,
    pub min: Duration,
    pub max: Duration,
}

/// Empirical `q`-quantile with linear interpolation between order statistics.
pub fn quantile(samples: &[Duration], q: f64) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let mut sorted: Vec<i64> = samples.iter().map(Duration::as_micros).collect();
    sorted.sort_unstable();
    let rank = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = rank - lo as f64;
    let value = sorted[lo] as f64 + frac * (sorted[hi] - sorted[lo]) as f64;
    Duration::from_micros(value.round() as i64)
}

/// Mean / median / extremes of a delay distribution.
pub fn summarize(samples: &[Duration]) -> DelaySummary {
    if samples.is_empty() {
        return DelaySummary {
            count: 0,
            mean: Duration::ZERO,
            median: Duration::ZERO,
            min: Duration::ZERO,
            max: Duration::ZERO,
        };
    }
    let sum: i64 = samples.iter().map(Duration::as_micros).sum();
    DelaySummary {
        count: samples.len(),
        mean: Duration::from_micros(
            (sum as f64 / samples.len() as f64).round() as i64
        ),
        median: quantile(samples, 0.5),
        min: *samples.iter().min().expect("non-empty"),
        max: *samples.iter().max().expect("non-empty"),
    }
}

/// Per-source dwell after arrival: pop time minus receipt time of every
/// released record (the delay metric of the published evaluation).
pub fn release_delays(runs: &[RunData]) -> BTreeMap<SourceId, Vec<Duration>> {
    collect_delays(runs, |pop_time, record_receipt, _| pop_time - record_receipt)
}

/// Per-source age at release: pop time minus measurement time.
pub fn release_ages(runs: &[RunData]) -> BTreeMap<SourceId, Vec<Duration>> {
    collect_delays(runs, |pop_time, _, record_meas| pop_time - record_meas)
}

fn collect_delays(
    runs: &[RunData],
    metric: impl Fn(Timestamp, Timestamp, Timestamp) -> Duration,
) -> BTreeMap<SourceId, Vec<Duration>> {
    let mut delays: BTreeMap<SourceId, Vec<Duration>> = BTreeMap::new();
    for run in runs {
        for output in &run.outputs {
            for record in &output.data {
                delays.entry(record.id).or_default().push(metric(
                    output.buffer_time,
                    record.receipt_time,
                    record.meas_time,
                ));
            }
        }
    }
    delays
}

/// Inputs seen and records discarded, per source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropAccounting {
    pub inputs: u64,
    pub drops: u64,
}

impl DropAccounting {
    pub fn ratio(&self) -> f64 {
        if self.inputs == 0 {
            0.0
        } else {
            self.drops as f64 / self.inputs as f64
        }
    }
}

pub fn drop_accounting(runs: &[RunData]) -> BTreeMap<SourceId, DropAccounting> {
    let mut accounting: BTreeMap<SourceId, DropAccounting> = BTreeMap::new();
    for run in runs {
        for input in &run.inputs {
            accounting.entry(input.id).or_default().inputs += 1;
        }
        for output in &run.outputs {
            for discarded in &output.discarded_data {
                accounting.entry(discarded.record.id).or_default().drops += 1;
            }
        }
    }
    accounting
}

/// Where every recorded input of a run ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conservation {
    pub pushed: usize,
    pub released: usize,
    pub discarded: usize,
    pub queued_at_end: usize,
    /// Records appearing more than once across released and discarded sets.
    pub duplicates: usize,
}

impl Conservation {
    /// Every pushed record was released once, discarded once, or is still
    /// queued, and nothing was duplicated.
    pub fn balanced(&self) -> bool {
        self.duplicates == 0 && self.pushed == self.released + self.discarded + self.queued_at_end
    }
}

/// Account for every input of a run by identity (source, measurement time,
/// receipt time). Only meaningful when the run recorded from step zero.
pub fn conservation(run: &RunData) -> Conservation {
    let mut seen: HashMap<(SourceId, Timestamp, Timestamp), usize> = HashMap::new();
    let mut released = 0usize;
    let mut discarded = 0usize;
    for output in &run.outputs {
        for record in &output.data {
            *seen.entry((record.id, record.meas_time, record.receipt_time))
                .or_insert(0) += 1;
            released += 1;
        }
        for record in output.discarded_data.iter().map(|d| &d.record) {
            *seen.entry((record.id, record.meas_time, record.receipt_time))
                .or_insert(0) += 1;
            discarded += 1;
        }
    }
    let duplicates = seen.values().filter(|&&count| count > 1).count();
    Conservation {
        pushed: run.inputs.len(),
        released,
        discarded,
        queued_at_end: run.queued_at_end,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: i64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn quantile_of_empty_sample_set_is_zero() {
        assert_eq!(quantile(&[], 0.5), Duration::ZERO);
    }

    #[test]
    fn summary_of_known_samples() {
        let samples = vec![ms(10), ms(20), ms(30), ms(40)];
        let summary = summarize(&samples);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, ms(25));
        assert_eq!(summary.median, ms(25));
        assert_eq!(summary.min, ms(10));
        assert_eq!(summary.max, ms(40));
        assert_eq!(quantile(&samples, 0.25), Duration::from_micros(17_500));
    }
}
