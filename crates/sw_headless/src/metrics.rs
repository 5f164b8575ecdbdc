//! Match metrics for balance analysis.
//!
//! Collected from the turn event stream, one [`GameMetrics`] per match,
//! aggregated over a batch into a [`BatchSummary`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sw_core::actor::{ActorId, TeamId};
use sw_core::events::TurnEvent;
use sw_core::game::Match;

/// Per-team totals over a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Rounds won.
    pub rounds_won: u32,
    /// Turns started by members.
    pub turns_taken: u32,
    /// Damage members dealt to others.
    pub damage_dealt: u64,
    /// Damage members received.
    pub damage_taken: u64,
    /// Enemies killed by members.
    pub kills: u32,
    /// Members lost.
    pub deaths: u32,
}

/// One round's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundMetrics {
    /// Round number (first is 1).
    pub round: u32,
    /// Winning team name, `None` if abandoned.
    pub winner: Option<String>,
    /// Ticks played.
    pub ticks: u64,
    /// Turns dispatched.
    pub turns: u64,
    /// `elimination`, `turn_limit`, `stalled` or `wipeout`.
    pub outcome: String,
}

/// Complete metrics for a single match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Seed used for turn order and strategies.
    pub seed: u64,
    /// Strategy name per team.
    pub strategies: Vec<String>,
    /// Rounds in play order.
    pub rounds: Vec<RoundMetrics>,
    /// Match winner (None = undecided).
    pub winner: Option<String>,
    /// How the match ended.
    pub win_condition: String,
    /// Ticks over all rounds.
    pub duration_ticks: u64,
    /// Turns over all rounds.
    pub total_turns: u64,
    /// Per-team totals keyed by team name.
    pub teams: BTreeMap<String, TeamMetrics>,
    /// Kills credited to each ability label.
    pub kills_by_ability: BTreeMap<String, u32>,
    /// Final match state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Get or create a team's totals.
    pub fn team_mut(&mut self, team: &str) -> &mut TeamMetrics {
        self.teams.entry(team.to_string()).or_default()
    }

    /// Finalize the match with its outcome.
    pub fn finalize(&mut self, winner: Option<String>, condition: &str, hash: u64) {
        self.winner = winner;
        self.win_condition = condition.to_string();
        self.final_state_hash = hash;
    }
}

/// Folds turn events into [`GameMetrics`].
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: GameMetrics,
    teams: BTreeMap<ActorId, String>,
    team_names: Vec<String>,
}

impl MetricsCollector {
    /// Start collecting for a match.
    #[must_use]
    pub fn new(metrics: GameMetrics) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }

    /// Capture team membership for the round that just started.
    pub fn begin_round(&mut self, game: &Match) {
        self.team_names = game.session().teams.iter().map(|t| t.name.clone()).collect();
        self.teams = game
            .actors()
            .sorted_ids()
            .into_iter()
            .filter_map(|id| {
                let team = game.actors().get(id)?.team();
                Some((id, self.team_name(team)))
            })
            .collect();
        for name in self.team_names.clone() {
            self.metrics.team_mut(&name);
        }
    }

    fn team_name(&self, team: TeamId) -> String {
        self.team_names
            .get(usize::from(team))
            .cloned()
            .unwrap_or_else(|| format!("Team {team}"))
    }

    fn team_of(&self, actor: ActorId) -> Option<String> {
        self.teams.get(&actor).cloned()
    }

    /// Fold one event.
    pub fn record(&mut self, event: &TurnEvent) {
        match event {
            TurnEvent::TurnStarted(actor) => {
                if let Some(team) = self.team_of(*actor) {
                    self.metrics.team_mut(&team).turns_taken += 1;
                }
            }
            TurnEvent::DamageApplied {
                source,
                target,
                amount,
                ..
            } => {
                let amount = u64::from(*amount);
                if let Some(team) = self.team_of(*target) {
                    self.metrics.team_mut(&team).damage_taken += amount;
                }
                if let Some(team) = source.filter(|s| s != target).and_then(|s| self.team_of(s)) {
                    self.metrics.team_mut(&team).damage_dealt += amount;
                }
            }
            TurnEvent::ActorDied {
                actor,
                killer,
                label,
            } => {
                if let Some(team) = self.team_of(*actor) {
                    self.metrics.team_mut(&team).deaths += 1;
                }
                if let Some(team) = killer.and_then(|k| self.team_of(k)) {
                    self.metrics.team_mut(&team).kills += 1;
                }
                *self
                    .metrics
                    .kills_by_ability
                    .entry(label.clone())
                    .or_insert(0) += 1;
            }
            TurnEvent::TeamWon(team) => {
                let name = self.team_name(*team);
                self.metrics.team_mut(&name).rounds_won += 1;
            }
            _ => {}
        }
    }

    /// Close the current round.
    pub fn end_round(&mut self, game: &Match, outcome: &str) {
        let ticks = game.world().tick_count();
        let turns = game.turns().turn_number();
        self.metrics.duration_ticks += ticks;
        self.metrics.total_turns += turns;
        self.metrics.rounds.push(RoundMetrics {
            round: game.round(),
            winner: game.winner().map(|t| self.team_name(t)),
            ticks,
            turns,
            outcome: outcome.to_string(),
        });
    }

    /// Name of a team in the current roster.
    #[must_use]
    pub fn name_of(&self, team: TeamId) -> String {
        self.team_name(team)
    }

    /// Metrics collected so far.
    #[must_use]
    pub fn metrics(&self) -> &GameMetrics {
        &self.metrics
    }

    /// Take the finished metrics.
    #[must_use]
    pub fn finish(self) -> GameMetrics {
        self.metrics
    }
}

/// Aggregate over a batch of matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Matches played.
    pub total_games: u32,
    /// Matches without a winner.
    pub draws: u32,
    /// Match wins per team name.
    pub wins: BTreeMap<String, u32>,
    /// Match win rate per team name.
    pub win_rates: BTreeMap<String, f64>,
    /// Mean rounds per match.
    pub avg_rounds: f64,
    /// Mean turns per match.
    pub avg_turns: f64,
    /// Mean ticks per match.
    pub avg_ticks: f64,
    /// Kills per ability over the batch.
    pub kills_by_ability: BTreeMap<String, u32>,
}

impl BatchSummary {
    /// Summarize a batch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        let mut summary = Self {
            total_games: u32::try_from(games.len()).unwrap_or(u32::MAX),
            ..Self::default()
        };
        if games.is_empty() {
            return summary;
        }

        for game in games {
            match &game.winner {
                Some(name) => *summary.wins.entry(name.clone()).or_insert(0) += 1,
                None => summary.draws += 1,
            }
            for (label, kills) in &game.kills_by_ability {
                *summary.kills_by_ability.entry(label.clone()).or_insert(0) += kills;
            }
        }

        let count = games.len() as f64;
        summary.win_rates = summary
            .wins
            .iter()
            .map(|(name, wins)| (name.clone(), f64::from(*wins) / count))
            .collect();
        summary.avg_rounds = games.iter().map(|g| g.rounds.len() as f64).sum::<f64>() / count;
        summary.avg_turns = games.iter().map(|g| g.total_turns as f64).sum::<f64>() / count;
        summary.avg_ticks = games.iter().map(|g| g.duration_ticks as f64).sum::<f64>() / count;
        summary
    }
}
