//! Batch match runner for balance testing.
//!
//! Plays many seeded matches in parallel with rayon and aggregates their
//! metrics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::game_runner::{run_game, GameConfig};
use crate::metrics::{BatchSummary, GameMetrics};
use crate::scenario::Scenario;
use crate::strategies::Strategy;

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Built-in scenario name or RON path
    pub scenario: String,
    /// Number of matches to play
    pub game_count: u32,
    /// Maximum parallel matches (0 = rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Seed of the first match; match `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Strategy names per team, e.g. `aggressive` or `random:3`
    pub strategies: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "skirmish".to_string(),
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            strategies: vec!["aggressive".to_string()],
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    #[must_use]
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set strategies
    #[must_use]
    pub fn with_strategies(mut self, strategies: &[&str]) -> Self {
        self.strategies = strategies.iter().map(|s| (*s).to_string()).collect();
        self
    }

    fn parsed_strategies(&self) -> Result<Vec<Strategy>, String> {
        self.strategies
            .iter()
            .map(|s| Strategy::parse(s).map_err(|e| e.to_string()))
            .collect()
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual match metrics
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// A match that failed to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Match index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

fn game_config(
    scenario: &Scenario,
    strategies: &[Strategy],
    index: u32,
    seed: u64,
) -> Result<GameConfig, String> {
    let catalog = scenario.load_catalog().map_err(|e| e.to_string())?;
    let mut config = GameConfig::new(scenario.clone(), seed).with_strategies(strategies.to_vec());
    config.catalog = catalog;
    config.game_id = format!("game_{index:05}");
    Ok(config)
}

fn run_one(
    scenario: &Scenario,
    strategies: &[Strategy],
    index: u32,
    seed: u64,
) -> Result<GameMetrics, String> {
    let config = game_config(scenario, strategies, index, seed)?;
    run_game(&config)
        .map(|result| result.metrics)
        .map_err(|e| e.to_string())
}

/// Run a batch of matches in parallel.
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    info!(
        "Starting batch run: {} matches of '{}'",
        config.game_count, config.scenario
    );

    let setup = Scenario::resolve(&config.scenario)
        .map_err(|e| e.to_string())
        .and_then(|scenario| Ok((scenario, config.parsed_strategies()?)));
    let (scenario, strategies) = match setup {
        Ok(setup) => setup,
        Err(message) => {
            warn!(error = %message, "Batch setup failed");
            let errors = (0..config.game_count)
                .map(|i| BatchError {
                    game_index: i,
                    seed: config.seed_start.wrapping_add(u64::from(i)),
                    message: message.clone(),
                })
                .collect();
            return BatchResults {
                config,
                games: Vec::new(),
                summary: BatchSummary::default(),
                duration_seconds: start.elapsed().as_secs_f64(),
                errors,
            };
        }
    };

    // Configure thread pool if specified
    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let completed = AtomicU32::new(0);
    let results: Vec<Result<GameMetrics, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            let result = run_one(&scenario, &strategies, i, seed).map_err(|message| {
                warn!("Match {} failed: {}", i, message);
                BatchError {
                    game_index: i,
                    seed,
                    message,
                }
            });
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % 10 == 0 {
                debug!("Progress: {}/{}", done, config.game_count);
            }
            result
        })
        .collect();

    let (games, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let games: Vec<GameMetrics> = games.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    #[allow(clippy::cast_precision_loss)]
    let rate = games.len() as f64 / duration_seconds.max(f64::EPSILON);
    info!(
        "Batch complete: {} matches in {:.1}s ({:.1} matches/sec)",
        games.len(),
        duration_seconds,
        rate
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Play the same seed `runs` times and check every run ends identically.
pub fn verify_determinism(scenario: &str, seed: u64, runs: u32) -> Result<bool, String> {
    let scenario = Scenario::resolve(scenario).map_err(|e| e.to_string())?;
    let strategies = [Strategy::Aggressive, Strategy::Random { seed }];

    let results = (0..runs)
        .map(|_| run_one(&scenario, &strategies, 0, seed))
        .collect::<Result<Vec<_>, _>>()?;

    let Some(first) = results.first() else {
        return Ok(true);
    };
    let identical = results.iter().all(|r| {
        r.final_state_hash == first.final_state_hash
            && r.winner == first.winner
            && r.duration_ticks == first.duration_ticks
            && r.total_turns == first.total_turns
    });
    if !identical {
        warn!(seed, "Runs diverged");
    }
    Ok(identical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("duel", 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_strategies(&["aggressive", "random:4"]);

        assert_eq!(config.scenario, "duel");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.parsed_strategies().unwrap().len(), 2);
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(BatchConfig::new("duel", 8));

        assert_eq!(results.games.len(), 8);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 8);
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_unknown_scenario_reports_errors() {
        let results = run_batch(BatchConfig::new("no/such/scenario.ron", 3));
        assert!(results.games.is_empty());
        assert_eq!(results.errors.len(), 3);
    }

    #[test]
    fn test_bad_strategy_reports_errors() {
        let results = run_batch(BatchConfig::new("duel", 2).with_strategies(&["turtle"]));
        assert_eq!(results.errors.len(), 2);
    }

    #[test]
    fn test_verify_determinism() {
        assert!(verify_determinism("duel", 12345, 3).unwrap());
        assert!(verify_determinism("free_for_all", 9, 2).unwrap());
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(BatchConfig::new("duel", 4));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 4);
        assert_eq!(loaded.config.scenario, "duel");
        assert_eq!(
            loaded.games[0].final_state_hash,
            results.games[0].final_state_hash
        );
    }
}
