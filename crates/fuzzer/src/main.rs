//! CLI entry point for the eBPF fuzzer binary.

use std::env;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use assembler as _;
use ebpf_core as _;
use fuzzer::config::{parse_args, Command, FuzzerConfig, USAGE_TEXT};
use fuzzer::coverage::InMemoryCoverage;
use fuzzer::executor::CorpusExecutor;
use fuzzer::logging;
use fuzzer::units::{ControlUnit, MetricsCollection, STRATEGY_TABLE};
#[cfg(test)]
use proptest as _;
use rand as _;
#[cfg(test)]
use rstest as _;
use serde as _;
use serde_json as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use tracing::{error, info};
use tracing_subscriber as _;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn report(metrics: &MetricsCollection) {
    info!("{}", metrics.snapshot());
}

fn write_metrics(metrics: &MetricsCollection, config: &FuzzerConfig) -> Result<(), i32> {
    let Some(path) = &config.metrics_json else {
        return Ok(());
    };
    let json = metrics.snapshot().to_json().map_err(|err| {
        error!(error = %err, "failed to serialise metrics");
        1
    })?;
    fs::write(path, json).map_err(|err| {
        error!(path = %path.display(), error = %err, "failed to write metrics");
        1
    })
}

fn run(config: &FuzzerConfig) -> Result<(), i32> {
    let executor = CorpusExecutor::new(&config.corpus_dir).map_err(|err| {
        eprintln!("error: {err}");
        2
    })?;
    let coverage = Arc::new(InMemoryCoverage::default());

    let mut unit = ControlUnit::new(config.limits);
    unit.init(Box::new(executor), coverage, &config.strategy)
        .map_err(|err| {
            eprintln!("error: {err}");
            2
        })?;
    let metrics = unit.metrics().ok_or(1)?;
    info!(
        strategy = %config.strategy,
        corpus = %config.corpus_dir.display(),
        "starting fuzzer"
    );

    let fuzz_thread = thread::Builder::new()
        .name("fuzz".into())
        .spawn(move || unit.run_fuzzer())
        .map_err(|err| {
            error!(error = %err, "failed to spawn fuzzing thread");
            1
        })?;

    let mut last_report = Instant::now();
    while !fuzz_thread.is_finished() {
        thread::sleep(POLL_INTERVAL.min(config.report_interval));
        if last_report.elapsed() >= config.report_interval {
            report(&metrics);
            last_report = Instant::now();
        }
    }

    let outcome = fuzz_thread.join().map_err(|_| {
        error!("fuzzing thread panicked");
        1
    })?;
    report(&metrics);
    write_metrics(&metrics, config)?;

    outcome.map_err(|err| {
        error!(error = %err, "fuzzing stopped");
        1
    })
}

fn main() {
    logging::init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(Command::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(Command::Strategies) => {
            for (name, _) in STRATEGY_TABLE {
                println!("{name}");
            }
            0
        }
        Ok(Command::Run(config)) => match run(&config) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            2
        }
    };

    std::process::exit(exit_code);
}
