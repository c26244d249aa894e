mod logging;

use std::process::{self, ExitCode};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use pmcycle::{CycleReport, ScenarioConfig};
use pmcycle_port_posix::{spawn_presser, PosixBench, SimulatedPlatformConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Sleep-cycle validation on the simulated host platform")]
struct Opts {
    #[command(subcommand)]
    scenario: Scenario,

    /// Sleep cycles (or deep-idle bouts) to run.
    #[arg(long, default_value_t = 3, global = true)]
    cycles: u32,

    /// Print wake-up lines straight to stdout instead of logging them.
    #[arg(long = "no-logging", global = true)]
    no_logging: bool,

    #[arg(long, default_value = "info", value_name = "LEVEL", global = true)]
    log_level: LevelFilter,

    #[arg(long, default_value_t = 200, value_name = "MS", global = true)]
    light_residency_ms: u64,

    #[arg(long, default_value_t = 1000, value_name = "MS", global = true)]
    deep_residency_ms: u64,

    /// Time between simulated button presses.
    #[arg(long, default_value_t = 1500, value_name = "MS", global = true)]
    press_interval_ms: u64,

    /// Print the final report as JSON.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    /// Light and deep sleep on the main thread alone.
    Single,
    /// Light and deep sleep with worker tasks suspended around each sleep.
    Multi,
    /// Deep-idle bouts started by simulated button presses.
    Async,
}

impl Opts {
    fn platform(&self) -> SimulatedPlatformConfig {
        SimulatedPlatformConfig {
            light_residency: Duration::from_millis(self.light_residency_ms),
            deep_residency: Duration::from_millis(self.deep_residency_ms),
            entry_latency: Duration::ZERO,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let opts = Opts::parse();
    logging::setup(opts.log_level).context("installing logger")?;
    ctrlc::set_handler(|| {
        warn!("Interrupted");
        process::exit(130);
    })
    .context("installing interrupt handler")?;

    let bench = PosixBench::new(opts.platform(), ScenarioConfig::default());
    let report = run(&bench, &opts).with_context(|| format!("{:?} scenario failed", opts.scenario))?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if report.is_consistent() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("{} counter mismatches", report.mismatches.len());
        Ok(ExitCode::from(2))
    }
}

fn run(bench: &PosixBench, opts: &Opts) -> anyhow::Result<CycleReport> {
    let use_logging = !opts.no_logging;
    let test = bench.test();

    let report = match opts.scenario {
        Scenario::Single => test.run_singlethread(use_logging, opts.cycles)?,
        Scenario::Multi => test.run_multithread(use_logging, opts.cycles)?,
        Scenario::Async => {
            info!("Pressing {} every {} ms", bench.button().name(), opts.press_interval_ms);
            let presser = spawn_presser(
                bench.button().clone(),
                Arc::clone(test.idle()),
                opts.cycles,
                Duration::from_millis(opts.press_interval_ms),
            )
            .context("spawning button presser")?;

            let result = test.run_multithread_async(use_logging, opts.cycles);
            if presser.join().is_err() {
                warn!("Button presser panicked");
            }
            result?
        }
    };
    Ok(report)
}

fn print_summary(report: &CycleReport) {
    println!("cycles: {}", report.expected_cycles);
    for state in &report.states {
        let marker = if state.exercised { "" } else { " (not checked)" };
        println!(
            "{}: {} entries, {} exits{marker}",
            state.state, state.counter.entry_count, state.counter.exit_count
        );
    }
    if let Some(last) = report.latency.last_ms {
        println!(
            "deep sleep entry latency: last {last} ms, {} elevated, {} too high",
            report.latency.elevated, report.latency.too_high
        );
    }
    println!(
        "result: {}",
        if report.is_consistent() {
            "consistent"
        } else {
            "MISMATCH"
        }
    );
}
