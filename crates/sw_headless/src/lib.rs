//! Headless match runner for automated play and CI verification.
//!
//! - **Interactive**: a controller drives one match through JSON lines
//!   on stdin/stdout ([`protocol`], [`runner`])
//! - **Automated**: scripted players fight whole matches ([`game_runner`],
//!   [`strategies`]) and report [`metrics`]
//! - **Batch**: many seeded matches in parallel for balance numbers and
//!   determinism checks ([`batch`])
//!
//! Logs go to stderr so stdout stays clean for the protocol.
//!
//! # Example
//!
//! ```bash
//! # Drive a duel by hand
//! echo '{"cmd":"query"}' | cargo run -p sw_headless -- play --scenario duel
//!
//! # Balance run
//! cargo run -p sw_headless -- batch --scenario skirmish --count 500
//!
//! # Determinism check
//! cargo run -p sw_headless -- verify --scenario free_for_all --seed 7
//! ```

pub mod batch;
pub mod game_runner;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod strategies;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use game_runner::{run_game, run_game_with, GameConfig, GameResult};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, Response, StateView};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
pub use strategies::{Decision, Strategy, StrategyError};
