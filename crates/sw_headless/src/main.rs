//! Headless Stick Warfare runner.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p sw_headless -- play --scenario duel
//!
//! # One automated match, events streamed as JSON lines
//! cargo run -p sw_headless -- run --scenario skirmish --seed 3 --events
//!
//! # Batch balance run
//! cargo run -p sw_headless -- batch --scenario free_for_all --count 1000 --output results/
//!
//! # Determinism check
//! cargo run -p sw_headless -- verify --scenario duel --seed 12345 --runs 5
//! ```
//!
//! Logs always go to stderr; stdout carries protocol and JSON output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sw_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    game_runner::{run_game_with, GameConfig},
    protocol::Response,
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
    strategies::Strategy,
};

#[derive(Parser)]
#[command(name = "sw_headless")]
#[command(about = "Headless Stick Warfare runner for automated play and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive one match through JSON commands on stdin
    Play {
        /// Built-in scenario name or RON file
        #[arg(short, long)]
        scenario: Option<String>,

        /// Turn order seed
        #[arg(long)]
        seed: Option<u64>,

        /// Output state after every command that advances time
        #[arg(long)]
        auto_state: bool,
    },

    /// Play one automated match
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Turn order and strategy seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Strategy per team (aggressive, random, random:<seed>)
        #[arg(long, value_delimiter = ',', default_value = "aggressive")]
        strategies: Vec<String>,

        /// Stream every turn event to stdout
        #[arg(long)]
        events: bool,

        /// Write the match metrics as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a batch of matches for balance testing
    Batch {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Number of matches to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel matches (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Strategy per team (aggressive, random, random:<seed>)
        #[arg(long, value_delimiter = ',', default_value = "aggressive")]
        strategies: Vec<String>,
    },

    /// Verify determinism by running the same seed multiple times
    Verify {
        /// Scenario to test
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs to stderr, stdout is for the protocol
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Some(Commands::Play {
            scenario,
            seed,
            auto_state,
        }) => cmd_play(scenario, seed, auto_state),
        Some(Commands::Run {
            scenario,
            seed,
            strategies,
            events,
            output,
        }) => cmd_run(&scenario, seed, &strategies, events, output),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            strategies,
        }) => cmd_batch(scenario, count, parallel, output, seed, strategies),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
        }) => cmd_verify(&scenario, seed, runs),
        None => cmd_play(None, None, false),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// Serve the JSON protocol on stdin/stdout
fn cmd_play(scenario: Option<String>, seed: Option<u64>, auto_state: bool) -> Result<(), String> {
    tracing::info!("Starting interactive session");
    let runner = HeadlessRunner::with_config(HeadlessConfig {
        auto_state_output: auto_state,
        scenario,
        seed,
    })
    .map_err(|e| e.to_string())?;
    runner.run().map_err(|e| e.to_string())
}

/// Play one automated match
fn cmd_run(
    scenario: &str,
    seed: u64,
    strategies: &[String],
    events: bool,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let scenario = Scenario::resolve(scenario).map_err(|e| e.to_string())?;
    let catalog = scenario.load_catalog().map_err(|e| e.to_string())?;
    let strategies = strategies
        .iter()
        .map(|s| Strategy::parse(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let mut config = GameConfig::new(scenario, seed).with_strategies(strategies);
    config.catalog = catalog;

    let result = run_game_with(&config, |_, event| {
        if events {
            print!(
                "{}",
                Response::Event {
                    event: event.clone()
                }
                .to_json_line()
            );
        }
    })
    .map_err(|e| e.to_string())?;

    let metrics = &result.metrics;
    tracing::info!(
        winner = ?metrics.winner,
        condition = %metrics.win_condition,
        rounds = metrics.rounds.len(),
        turns = metrics.total_turns,
        hash = %format!("{:016x}", result.final_state_hash),
        "Result"
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(metrics).map_err(|e| e.to_string())?;
        std::fs::write(&path, json).map_err(|e| format!("{}: {e}", path.display()))?;
        tracing::info!("Metrics saved to {}", path.display());
    }
    Ok(())
}

/// Run a batch of matches for balance testing
fn cmd_batch(
    scenario: String,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    strategies: Vec<String>,
) -> Result<(), String> {
    tracing::info!(
        scenario = %scenario,
        count,
        parallel,
        seed,
        output = %output.display(),
        "Batch configuration"
    );

    let config = BatchConfig {
        scenario,
        game_count: count,
        parallel_games: parallel,
        output_dir: output.clone(),
        seed_start: seed,
        strategies,
    };
    let results = run_batch(config);

    let summary = &results.summary;
    tracing::info!(
        games = summary.total_games,
        draws = summary.draws,
        avg_rounds = %format!("{:.2}", summary.avg_rounds),
        avg_turns = %format!("{:.1}", summary.avg_turns),
        "Batch summary"
    );
    for (team, rate) in &summary.win_rates {
        tracing::info!("  {team}: {:.1}% wins", rate * 100.0);
    }
    for (ability, kills) in &summary.kills_by_ability {
        tracing::info!("  {ability}: {kills} kills");
    }

    let path = output.join("batch.json");
    results
        .save(&path)
        .map_err(|e| format!("{}: {e}", path.display()))?;
    tracing::info!("Results saved to {}", path.display());

    if results.errors.is_empty() {
        Ok(())
    } else {
        Err(format!("{} matches failed", results.errors.len()))
    }
}

/// Verify determinism by running the same seed multiple times
fn cmd_verify(scenario: &str, seed: u64, runs: u32) -> Result<(), String> {
    tracing::info!(scenario, seed, runs, "Verifying determinism");
    if verify_determinism(scenario, seed, runs)? {
        tracing::info!("PASS: {runs} runs identical");
        Ok(())
    } else {
        Err("FAIL: runs diverged".to_string())
    }
}
