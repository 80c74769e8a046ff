//! SeqFuse simulator - run the published buffer evaluations from the command line
//!
//! Reproduces the two-sensor Monte-Carlo scenarios against either the
//! adaptive engine or the fixed-lag baseline and prints per-source drop
//! rates, release-delay distributions and estimator summaries.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seqfuse_core::{AdaptiveParams, Duration, FixedLagParams};
use seqfuse_eval::analysis::{
    drop_accounting, quantile, release_ages, release_delays, summarize, DelaySummary,
};
use seqfuse_eval::{
    evaluate, regime_change_scenario, two_sensor_scenario, BufferConfig, MonteCarloConfig,
    RunData, ScenarioConfig,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// SeqFuse - minimal-latency in-sequence buffer evaluations
#[derive(Parser)]
#[command(name = "seqfuse-sim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Print the summary as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two sensors with asymmetric latency (100ms vs 15ms)
    Asymmetric {
        #[command(flatten)]
        opts: RunOptions,
    },
    /// Same setup, with the slow sensor swapped out mid-run
    RegimeChange {
        #[command(flatten)]
        opts: RunOptions,

        /// Step at which the sensor set changes
        #[arg(long, default_value_t = 25_000)]
        change_step: u64,
    },
}

#[derive(clap::Args)]
struct RunOptions {
    /// Number of Monte-Carlo runs
    #[arg(short, long, default_value_t = 10)]
    runs: usize,

    /// Pop iterations per run
    #[arg(short, long, default_value_t = 40_000)]
    iterations: u64,

    /// Steps before recording starts
    #[arg(short, long, default_value_t = 10_000)]
    warmup: u64,

    /// Base seed; run k uses seed + k
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Use the fixed-lag baseline instead of the adaptive engine
    #[arg(long)]
    fixed_lag: bool,

    /// Lag of the fixed-lag baseline, in milliseconds
    #[arg(long, default_value_t = 123.38)]
    lag_ms: f64,
}

#[derive(Debug, Serialize)]
struct SourceSummary {
    source: u32,
    inputs: u64,
    drops: u64,
    drop_ratio: f64,
    dwell: DelaySummary,
    dwell_p25: Duration,
    dwell_p75: Duration,
    age: DelaySummary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Asymmetric { opts } => {
            let scenario = configure(two_sensor_scenario(buffer_config(&opts)), &opts);
            run(scenario, &opts, cli.json)
        }
        Commands::RegimeChange { opts, change_step } => {
            let mut scenario = configure(regime_change_scenario(buffer_config(&opts)), &opts);
            scenario.change_step = Some(change_step);
            run(scenario, &opts, cli.json)
        }
    }
}

fn buffer_config(opts: &RunOptions) -> BufferConfig {
    if opts.fixed_lag {
        BufferConfig::FixedLag(FixedLagParams::Lag(Duration::from_millis_f64(opts.lag_ms)))
    } else {
        BufferConfig::Adaptive(AdaptiveParams::default())
    }
}

fn configure(scenario: ScenarioConfig, opts: &RunOptions) -> ScenarioConfig {
    scenario
        .with_iterations(opts.iterations)
        .with_warmup_steps(opts.warmup)
        .with_estimates(!opts.fixed_lag)
}

fn run(scenario: ScenarioConfig, opts: &RunOptions, json: bool) -> Result<()> {
    print_parameters(&scenario, opts);

    let config = MonteCarloConfig::default()
        .with_runs(opts.runs)
        .with_base_seed(opts.seed);
    let runs = evaluate(&scenario, &config).context("evaluation failed verification")?;
    info!(runs = runs.len(), "evaluation complete");

    let summaries = summarize_runs(&runs);
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            print_source(summary);
        }
        print_estimates(&runs);
    }
    Ok(())
}

fn print_parameters(scenario: &ScenarioConfig, opts: &RunOptions) {
    println!("### Parameters ###");
    println!("pop period: {}", scenario.pop_period);
    match &scenario.buffer {
        BufferConfig::Adaptive(params) => println!("adaptive buffer: {params:?}"),
        BufferConfig::FixedLag(params) => {
            println!("fixed-lag buffer: lag {}", params.lag())
        }
    }
    println!("sources: {}", scenario.sources.len());
    for (index, profile) in scenario.sources.iter().enumerate() {
        println!(
            " - #{index}: period {} (stddev {}), latency {} (stddev {}), drop rate {}",
            profile.period,
            profile.period_stddev,
            profile.latency,
            profile.latency_stddev,
            profile.drop_rate
        );
    }
    println!("iterations per run: {}", scenario.iterations);
    println!("runs: {}", opts.runs);
    println!();
}

fn summarize_runs(runs: &[RunData]) -> Vec<SourceSummary> {
    let drops = drop_accounting(runs);
    let dwell = release_delays(runs);
    let ages = release_ages(runs);

    drops
        .iter()
        .map(|(id, accounting)| {
            let dwell_samples = dwell.get(id).map(Vec::as_slice).unwrap_or(&[]);
            let age_samples = ages.get(id).map(Vec::as_slice).unwrap_or(&[]);
            SourceSummary {
                source: id.0,
                inputs: accounting.inputs,
                drops: accounting.drops,
                drop_ratio: accounting.ratio(),
                dwell: summarize(dwell_samples),
                dwell_p25: quantile(dwell_samples, 0.25),
                dwell_p75: quantile(dwell_samples, 0.75),
                age: summarize(age_samples),
            }
        })
        .collect()
}

fn print_source(summary: &SourceSummary) {
    println!("Source #{}", summary.source);
    println!(
        "  drop rate: {:.3}% ({} of {})",
        summary.drop_ratio * 100.0,
        summary.drops,
        summary.inputs
    );
    println!(
        "  dwell after arrival: mean {} median {} (p25 {} / p75 {}) min {} max {}",
        summary.dwell.mean,
        summary.dwell.median,
        summary.dwell_p25,
        summary.dwell_p75,
        summary.dwell.min,
        summary.dwell.max
    );
    println!(
        "  age at release: mean {} median {}",
        summary.age.mean, summary.age.median
    );
}

fn print_estimates(runs: &[RunData]) {
    let Some(last) = runs.iter().filter_map(|run| run.estimates.last()).next_back() else {
        return;
    };
    println!();
    println!("### Final estimates (last run) ###");
    for (index, est) in last.sources.iter().enumerate() {
        println!(
            "Source #{index}: period {} (stddev {}, q-jitter {}), latency {} (stddev {}, q-jitter {})",
            est.period,
            est.period_stddev,
            est.period_jitter,
            est.latency,
            est.latency_stddev,
            est.latency_jitter
        );
    }
}
