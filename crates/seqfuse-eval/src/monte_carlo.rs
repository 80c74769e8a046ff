//! Monte-Carlo driver
//!
//! Runs many independent instances of a scenario across worker threads.
//! Buffers are freely constructible per thread and every result is a plain
//! value, so the workers share nothing and hand their runs back over a
//! channel.

use crate::scenario::{run_scenario, RunData, ScenarioConfig, VerificationError};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::thread;
use tracing::info;

/// Worker-thread cap; runs beyond it are interleaved.
pub const DEFAULT_MAX_WORKERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub runs: usize,
    pub max_workers: usize,
    /// Run `k` executes with seed `base_seed + k`, so a whole campaign is
    /// reproducible.
    pub base_seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: 10,
            max_workers: DEFAULT_MAX_WORKERS,
            base_seed: 0,
        }
    }
}

impl MonteCarloConfig {
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_base_seed(mut self, base_seed: u64) -> Self {
        self.base_seed = base_seed;
        self
    }
}

/// Run the campaign and return the runs in seed order.
pub fn evaluate(
    scenario: &ScenarioConfig,
    config: &MonteCarloConfig,
) -> Result<Vec<RunData>, VerificationError> {
    let runs = config.runs;
    if runs == 0 {
        return Ok(Vec::new());
    }
    let workers = config.max_workers.clamp(1, runs);
    info!(runs, workers, "starting Monte-Carlo evaluation");

    let (sender, receiver) = mpsc::channel();
    let mut collected: Vec<(usize, Result<RunData, VerificationError>)> =
        thread::scope(|scope| {
            for worker in 0..workers {
                let sender = sender.clone();
                scope.spawn(move || {
                    let mut run = worker;
                    while run < runs {
                        let result = run_scenario(scenario, config.base_seed + run as u64);
                        if sender.send((run, result)).is_err() {
                            return;
                        }
                        run += workers;
                    }
                });
            }
            drop(sender);
            receiver.iter().collect()
        });

    collected.sort_by_key(|(index, _)| *index);
    let mut results = Vec::with_capacity(runs);
    for (index, result) in collected {
        let data = result?;
        info!(run = index, outputs = data.outputs.len(), "run finished");
        results.push(data);
    }
    Ok(results)
}
