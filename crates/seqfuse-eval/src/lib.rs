//! SeqFuse Evaluation
//!
//! Synthetic measurement generators, a deterministic scenario runner and a
//! multi-threaded Monte-Carlo driver for the SeqFuse buffers, mirroring the
//! published two-sensor evaluations.
//!
//! The harness only pushes, pops and inspects outputs; nothing here
//! influences buffer semantics.

pub mod analysis;
pub mod generators;
pub mod monte_carlo;
pub mod scenario;

pub use generators::{MeasurementGenerator, PopClock, SourceProfile};
pub use monte_carlo::{evaluate, MonteCarloConfig};
pub use scenario::{
    asymmetric_sensors, regime_change_scenario, run_scenario, shifted_sensors,
    two_sensor_scenario, BufferConfig, InputRecord, RunData, ScenarioConfig, VerificationError,
};
