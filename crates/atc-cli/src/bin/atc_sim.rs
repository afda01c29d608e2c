//! Offline scenario runner for the ATC engine.
//!
//! Events are written to stdout as JSON lines; logs go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use atc_cli::sim::{
    create_crossing_scenario, create_overload_scenario, create_parallel_scenario,
    create_random_scenario, run, verify, Scenario,
};

/// Built-in scenarios
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScenarioType {
    /// Two aircraft head-on at the same level
    Crossing,
    /// Two aircraft on parallel tracks, well separated
    Parallel,
    /// One sector loaded past capacity
    Overload,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a seeded random scenario as JSON
    Generate {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 40)]
        flights: usize,
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 60)]
        duration: u32,
        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a built-in scenario as JSON
    Scenario {
        #[arg(value_enum)]
        kind: ScenarioType,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replay a scenario file and print every engine event
    Run {
        file: PathBuf,
        /// Print only the summary line
        #[arg(long)]
        quiet: bool,
    },
    /// Check that a replica restored mid-run matches a straight-through run
    Verify { file: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("atc_sim=info".parse()?)
                .add_directive("atc_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Generate {
            seed,
            flights,
            duration,
            out,
        } => {
            let scenario = create_random_scenario(seed, flights, duration)?;
            write_scenario(&scenario, out)
        }
        Command::Scenario { kind, out } => {
            let scenario = match kind {
                ScenarioType::Crossing => create_crossing_scenario(),
                ScenarioType::Parallel => create_parallel_scenario(),
                ScenarioType::Overload => create_overload_scenario(),
            };
            write_scenario(&scenario, out)
        }
        Command::Run { file, quiet } => {
            let scenario = read_scenario(&file)?;
            let report = run(&scenario)?;
            if !quiet {
                let mut stdout = std::io::stdout().lock();
                for event in &report.events {
                    serde_json::to_writer(&mut stdout, event)?;
                    writeln!(stdout)?;
                }
            }
            eprintln!("{}", report.summary());
            Ok(())
        }
        Command::Verify { file } => {
            let scenario = read_scenario(&file)?;
            let report = verify(&scenario)?;
            eprintln!(
                "{}: split at step {}, {} events compared, snapshots match: {}",
                scenario.name, report.split_step, report.events_compared, report.snapshots_match
            );
            if !report.is_consistent() {
                bail!("replica diverged at event {:?}", report.first_divergence);
            }
            Ok(())
        }
    }
}

fn read_scenario(path: &Path) -> Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid scenario file {}", path.display()))
}

fn write_scenario(scenario: &Scenario, out: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(scenario)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                flights = scenario.flights.len(),
                "Scenario written"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
