//! Scenario runner
//!
//! Steps a fixed-period pop clock, feeds every generator's arrivals into the
//! buffer in receipt order, pops, and records what happened past a warmup
//! horizon. One run is fully determined by its configuration and seed.

use crate::generators::{MeasurementGenerator, PopClock, SourceProfile};
use seqfuse_core::{
    AdaptiveBuffer, AdaptiveParams, Duration, FixedLagBuffer, FixedLagParams, PopResult,
    SequenceBuffer, SourceId, Timestamp,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// What the harness pushes as payload: the original input, so every popped
/// record can be checked against what went in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub id: SourceId,
    pub meas_time: Timestamp,
    pub receipt_time: Timestamp,
}

/// Which engine a scenario exercises.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BufferConfig {
    Adaptive(AdaptiveParams),
    FixedLag(FixedLagParams),
}

/// One estimator snapshot per source, in source-index order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceEstimates {
    pub period: Duration,
    pub period_stddev: Duration,
    pub period_jitter: Duration,
    pub latency: Duration,
    pub latency_stddev: Duration,
    pub latency_jitter: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateSnapshot {
    pub time: Timestamp,
    pub sources: Vec<SourceEstimates>,
}

/// Everything one run produced past the warmup horizon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunData {
    pub inputs: Vec<InputRecord>,
    pub outputs: Vec<PopResult<InputRecord>>,
    pub estimates: Vec<EstimateSnapshot>,
    /// Measurements still sitting in the buffer when the run ended.
    pub queued_at_end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub pop_period: Duration,
    pub sources: Vec<SourceProfile>,
    pub buffer: BufferConfig,
    pub iterations: u64,
    /// Steps to run before recording anything.
    pub warmup_steps: u64,
    /// Swap the generator set at this step (regime change).
    pub change_step: Option<u64>,
    pub changed_sources: Vec<SourceProfile>,
    pub record_estimates: bool,
    pub verify: bool,
}

impl ScenarioConfig {
    pub fn new(pop_period: Duration, sources: Vec<SourceProfile>, buffer: BufferConfig) -> Self {
        Self {
            pop_period,
            sources,
            buffer,
            iterations: 40_000,
            warmup_steps: 10_000,
            change_step: None,
            changed_sources: Vec::new(),
            record_estimates: false,
            verify: true,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warmup_steps(mut self, warmup_steps: u64) -> Self {
        self.warmup_steps = warmup_steps;
        self
    }

    pub fn with_regime_change(mut self, change_step: u64, sources: Vec<SourceProfile>) -> Self {
        self.change_step = Some(change_step);
        self.changed_sources = sources;
        self
    }

    pub fn with_estimates(mut self, record: bool) -> Self {
        self.record_estimates = record;
        self
    }

    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// A recorded run broke one of the buffer's output guarantees.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerificationError {
    #[error("released measurement times regressed: {previous} then {current}")]
    OrderingViolation {
        previous: Timestamp,
        current: Timestamp,
    },
    #[error("released record does not match its payload at {meas_time}")]
    PayloadMismatch { meas_time: Timestamp },
}

enum Engine {
    Adaptive(AdaptiveBuffer<InputRecord>),
    FixedLag(FixedLagBuffer<InputRecord>),
}

impl Engine {
    fn new(config: &BufferConfig) -> Self {
        match *config {
            BufferConfig::Adaptive(params) => Engine::Adaptive(AdaptiveBuffer::new(params)),
            BufferConfig::FixedLag(params) => Engine::FixedLag(FixedLagBuffer::new(params)),
        }
    }

    fn buffer(&mut self) -> &mut dyn SequenceBuffer<InputRecord> {
        match self {
            Engine::Adaptive(buffer) => buffer,
            Engine::FixedLag(buffer) => buffer,
        }
    }

    fn queued(&self) -> usize {
        match self {
            Engine::Adaptive(buffer) => buffer.queued(),
            Engine::FixedLag(buffer) => buffer.queued(),
        }
    }
}

/// Run one scenario to completion. Deterministic for a given `seed`; each
/// generator derives its own stream from it.
pub fn run_scenario(config: &ScenarioConfig, seed: u64) -> Result<RunData, VerificationError> {
    let mut current_time = Timestamp::EPOCH;
    let mut clock = PopClock::new(config.pop_period, current_time);
    let mut generators = spawn_generators(&config.sources, current_time, seed);
    let mut engine = Engine::new(&config.buffer);

    let mut run = RunData::default();
    let mut latest_receipt: Option<Timestamp> = None;

    for step in 0..config.iterations {
        if config.change_step == Some(step) {
            debug!(step, "switching generator regime");
            generators = spawn_generators(&config.changed_sources, current_time, seed ^ step);
        }
        current_time = clock.next().expect("clock never ends");

        // arrivals since the previous step, in receipt order across sources
        let mut arrivals: Vec<InputRecord> = Vec::new();
        for (index, generator) in generators.iter_mut().enumerate() {
            if let Some((meas_time, receipt_time)) = generator.next_before(current_time) {
                arrivals.push(InputRecord {
                    id: SourceId(index as u32),
                    meas_time,
                    receipt_time,
                });
            }
        }
        arrivals.sort_by_key(|input| input.receipt_time);

        for input in arrivals {
            // a regime change can restart receipts behind the high-water mark;
            // drop those the way a replay merge would
            if latest_receipt.is_some_and(|latest| input.receipt_time < latest) {
                continue;
            }
            latest_receipt = Some(input.receipt_time);
            engine
                .buffer()
                .push(input.id, input.receipt_time, input.meas_time, input)
                .expect("receipts are fed in order");
            if step > config.warmup_steps {
                run.inputs.push(input);
            }
        }

        if config.record_estimates && step > config.warmup_steps {
            if let Engine::Adaptive(buffer) = &engine {
                let q = match config.buffer {
                    BufferConfig::Adaptive(params) => params.jitter_quantile,
                    BufferConfig::FixedLag(_) => unreachable!("adaptive engine"),
                };
                let sources = (0..config.sources.len())
                    .map(|index| {
                        let id = SourceId(index as u32);
                        SourceEstimates {
                            period: buffer.estimated_period(id),
                            period_stddev: buffer.estimated_period_stddev(id),
                            period_jitter: buffer.estimated_period_jitter(id, q),
                            latency: buffer.estimated_latency(id),
                            latency_stddev: buffer.estimated_latency_stddev(id),
                            latency_jitter: buffer.estimated_latency_jitter(id, q),
                        }
                    })
                    .collect();
                run.estimates.push(EstimateSnapshot {
                    time: current_time,
                    sources,
                });
            }
        }

        let result = engine.buffer().pop(current_time);
        if !result.is_empty() && step > config.warmup_steps {
            run.outputs.push(result);
        }
    }

    run.queued_at_end = engine.queued();
    if config.verify {
        verify(&run)?;
    }
    Ok(run)
}

fn spawn_generators(
    profiles: &[SourceProfile],
    init_time: Timestamp,
    seed: u64,
) -> Vec<MeasurementGenerator> {
    profiles
        .iter()
        .enumerate()
        .map(|(index, profile)| {
            MeasurementGenerator::new(*profile, init_time, seed.wrapping_add(index as u64))
        })
        .collect()
}

/// Check the recorded outputs against the buffer's guarantees: globally
/// non-decreasing released measurement times, and released records that still
/// match the payload pushed with them.
pub fn verify(run: &RunData) -> Result<(), VerificationError> {
    let mut previous: Option<Timestamp> = None;
    for output in &run.outputs {
        for record in &output.data {
            if let Some(previous) = previous {
                if record.meas_time < previous {
                    return Err(VerificationError::OrderingViolation {
                        previous,
                        current: record.meas_time,
                    });
                }
            }
            previous = Some(record.meas_time);
        }
    }

    for output in &run.outputs {
        for record in &output.data {
            if record.meas_time != record.payload.meas_time
                || record.receipt_time != record.payload.receipt_time
            {
                return Err(VerificationError::PayloadMismatch {
                    meas_time: record.meas_time,
                });
            }
        }
    }
    Ok(())
}

/// The two-sensor setup of the published evaluation: a slow, high-latency
/// sensor next to a fast, low-latency one.
pub fn asymmetric_sensors() -> Vec<SourceProfile> {
    vec![
        SourceProfile::new(Duration::from_millis(100), Duration::from_millis(100))
            .with_period_stddev(Duration::from_millis(1))
            .with_latency_stddev(Duration::from_millis(10)),
        SourceProfile::new(Duration::from_millis(50), Duration::from_millis(15))
            .with_period_stddev(Duration::from_millis(1))
            .with_latency_stddev(Duration::from_millis(1)),
    ]
}

/// The regime-change setup: the slow sensor is replaced by a mid-latency one.
pub fn shifted_sensors() -> Vec<SourceProfile> {
    vec![
        SourceProfile::new(Duration::from_millis(50), Duration::from_millis(25))
            .with_period_stddev(Duration::from_millis(1))
            .with_latency_stddev(Duration::from_millis(5)),
        SourceProfile::new(Duration::from_millis(50), Duration::from_millis(15))
            .with_period_stddev(Duration::from_millis(1))
            .with_latency_stddev(Duration::from_millis(1)),
    ]
}

/// Published two-sensor scenario: 1 ms pops, 40 000 iterations, 10 000 warmup.
pub fn two_sensor_scenario(buffer: BufferConfig) -> ScenarioConfig {
    ScenarioConfig::new(Duration::from_millis(1), asymmetric_sensors(), buffer)
}

/// Published regime-change scenario: the slow sensor swaps at step 25 000.
pub fn regime_change_scenario(buffer: BufferConfig) -> ScenarioConfig {
    two_sensor_scenario(buffer).with_regime_change(25_000, shifted_sensors())
}
