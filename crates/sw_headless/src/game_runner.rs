//! Automated match driver.
//!
//! Plays every round of a scenario with one [`Strategy`] per team, feeding
//! the event stream into a [`MetricsCollector`] and an optional sink.

use std::time::Instant;

use rand::rngs::SmallRng;
use sw_core::ability::AbilityCatalog;
use sw_core::controller::{ConfirmOutcome, SelectionState};
use sw_core::error::Result;
use sw_core::events::TurnEvent;
use sw_core::game::Match;
use sw_core::phase::Phase;
use tracing::{debug, info, warn};

use crate::metrics::{GameMetrics, MetricsCollector};
use crate::scenario::Scenario;
use crate::strategies::Strategy;

/// Ticks one turn may take before the round is abandoned as stalled.
///
/// The core has no watchdog; a holding ability that never reports would
/// otherwise spin the runner forever.
pub const MAX_TICKS_PER_TURN: u64 = 60 * sw_core::math::TICK_RATE as u64;

/// Configuration for a single automated match.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Identifier used in logs and metrics.
    pub game_id: String,
    /// Turn order and strategy seed.
    pub seed: u64,
    /// Roster and runtime configuration.
    pub scenario: Scenario,
    /// Abilities the roster draws from.
    pub catalog: AbilityCatalog,
    /// Strategy per team, cycled when shorter than the team list.
    pub strategies: Vec<Strategy>,
}

impl GameConfig {
    /// Config with the standard catalog and aggressive players.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            game_id: format!("game_{seed}"),
            seed,
            scenario,
            catalog: AbilityCatalog::standard(),
            strategies: vec![Strategy::Aggressive],
        }
    }

    /// Replace the strategies.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    fn strategy_for(&self, team: usize) -> Strategy {
        if self.strategies.is_empty() {
            return Strategy::default();
        }
        self.strategies[team % self.strategies.len()]
    }
}

/// Outcome of [`run_game`].
#[derive(Debug, Clone)]
pub struct GameResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// Final match state hash.
    pub final_state_hash: u64,
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundEnd {
    Elimination,
    TurnLimit,
    Stalled,
    Wipeout,
}

impl RoundEnd {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Elimination => "elimination",
            Self::TurnLimit => "turn_limit",
            Self::Stalled => "stalled",
            Self::Wipeout => "wipeout",
        }
    }
}

/// Play a whole match.
pub fn run_game(config: &GameConfig) -> Result<GameResult> {
    run_game_with(config, |_, _| {})
}

/// Play a whole match, handing every event to `sink` with its round.
pub fn run_game_with<F>(config: &GameConfig, mut sink: F) -> Result<GameResult>
where
    F: FnMut(u32, &TurnEvent),
{
    let started = Instant::now();
    info!(
        game_id = %config.game_id,
        seed = config.seed,
        scenario = %config.scenario.name,
        "Starting match"
    );

    let mut match_config = config.scenario.config;
    match_config.orchestrator.seed = config.seed;
    let mut game = Match::new(
        config.scenario.session.clone(),
        config.catalog.clone(),
        match_config,
    )?;

    let team_count = config.scenario.session.teams.len();
    let strategies: Vec<Strategy> = (0..team_count).map(|t| config.strategy_for(t)).collect();
    let mut rngs: Vec<SmallRng> = strategies
        .iter()
        .enumerate()
        .map(|(team, s)| s.rng(config.seed.wrapping_add(team as u64)))
        .collect();

    let mut metrics = GameMetrics::new(&config.game_id, &config.scenario.name, config.seed);
    metrics.strategies = strategies.iter().map(|s| s.name().to_string()).collect();
    let mut collector = MetricsCollector::new(metrics);

    let mut abandoned = None;
    while !game.session().is_complete() {
        game.start_round()?;
        collector.begin_round(&game);
        let round = game.round();

        let end = play_round(
            &mut game,
            config.scenario.max_turns,
            &strategies,
            &mut rngs,
            |event| {
                collector.record(event);
                sink(round, event);
            },
        );
        collector.end_round(&game, end.as_str());

        if end != RoundEnd::Elimination {
            warn!(game_id = %config.game_id, round, outcome = end.as_str(), "Round abandoned");
            abandoned = Some(end);
            break;
        }
        game.finish_round()?;
    }

    let hash = game.state_hash();
    let winner = game.session().match_winner();
    let condition = match (abandoned, winner) {
        (Some(end), _) => end.as_str(),
        (None, Some(_)) => "majority",
        (None, None) => "no_majority",
    };
    let winner_name = winner.map(|t| collector.name_of(t));

    let mut metrics = collector.finish();
    metrics.finalize(winner_name, condition, hash);

    info!(
        game_id = %config.game_id,
        winner = ?metrics.winner,
        rounds = metrics.rounds.len(),
        turns = metrics.total_turns,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Match finished"
    );

    Ok(GameResult {
        metrics,
        final_state_hash: hash,
    })
}

fn play_round<F>(
    game: &mut Match,
    max_turns: u64,
    strategies: &[Strategy],
    rngs: &mut [SmallRng],
    mut on_event: F,
) -> RoundEnd
where
    F: FnMut(&TurnEvent),
{
    let mut turn = game.turns().turn_number();
    let mut turn_started_tick = game.world().tick_count();

    loop {
        for event in game.drain_events() {
            on_event(&event);
        }
        if game.winner().is_some() {
            return RoundEnd::Elimination;
        }
        if game.actors().living().is_empty() {
            return RoundEnd::Wipeout;
        }
        if game.turns().turn_number() > max_turns {
            return RoundEnd::TurnLimit;
        }
        if game.turns().turn_number() != turn {
            turn = game.turns().turn_number();
            turn_started_tick = game.world().tick_count();
        } else if game.world().tick_count() - turn_started_tick > MAX_TICKS_PER_TURN {
            return RoundEnd::Stalled;
        }

        match game.phase() {
            Phase::Idle => return RoundEnd::Stalled,
            Phase::Starting | Phase::NextUnit => {
                game.transition_complete();
            }
            Phase::Movement => {
                game.end_movement();
            }
            Phase::TurnEnd => game.tick(),
            Phase::Action => take_action(game, strategies, rngs),
        }
    }
}

fn take_action(game: &mut Match, strategies: &[Strategy], rngs: &mut [SmallRng]) {
    let Some(actor) = game.active_actor() else {
        return;
    };
    let team = game.actors().get(actor).map_or(0, |a| usize::from(a.team()));
    let busy = game
        .controller(actor)
        .map_or(true, |c| c.action_used() || c.state() != SelectionState::Idle);
    if busy {
        game.tick();
        return;
    }

    let (Some(strategy), Some(rng)) = (strategies.get(team), rngs.get_mut(team)) else {
        game.end_turn();
        return;
    };
    let Some(decision) = strategy.decide(game, rng) else {
        debug!(actor, "Nothing to do, passing");
        game.end_turn();
        return;
    };

    game.select_slot(decision.slot);
    match game.press_confirm(decision.target) {
        ConfirmOutcome::Charging => {
            for _ in 0..decision.hold_ticks {
                game.tick();
            }
            if game.release_confirm(decision.target) == ConfirmOutcome::Ignored {
                game.end_turn();
            }
        }
        ConfirmOutcome::Ignored => {
            game.end_turn();
        }
        ConfirmOutcome::Resolved { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_core::orchestrator::OrchestratorConfig;

    #[test]
    fn test_duel_plays_to_a_winner() {
        let result = run_game(&GameConfig::new(Scenario::duel(), 1)).unwrap();
        let metrics = &result.metrics;
        assert!(metrics.winner.is_some());
        assert_eq!(metrics.win_condition, "majority");
        assert!(metrics.rounds.len() >= 2 && metrics.rounds.len() <= 3);
        assert!(metrics.rounds.iter().all(|r| r.outcome == "elimination"));
        assert_eq!(metrics.final_state_hash, result.final_state_hash);
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = GameConfig::new(Scenario::default(), 77)
            .with_strategies(vec![Strategy::Random { seed: 1 }, Strategy::Aggressive]);
        let a = run_game(&config).unwrap();
        let b = run_game(&config).unwrap();
        assert_eq!(a.final_state_hash, b.final_state_hash);
        assert_eq!(a.metrics.winner, b.metrics.winner);
        assert_eq!(a.metrics.total_turns, b.metrics.total_turns);
    }

    #[test]
    fn test_sink_sees_team_won_per_round() {
        let mut wins = Vec::new();
        let result = run_game_with(&GameConfig::new(Scenario::duel(), 3), |round, event| {
            if let TurnEvent::TeamWon(team) = event {
                wins.push((round, *team));
            }
        })
        .unwrap();
        assert_eq!(wins.len(), result.metrics.rounds.len());
        assert!(wins.iter().enumerate().all(|(i, (round, _))| *round as usize == i + 1));
    }

    #[test]
    fn test_turn_limit_abandons_round() {
        let mut scenario = Scenario::duel();
        scenario.max_turns = 2;
        let result = run_game(&GameConfig::new(scenario, 0)).unwrap();
        assert_eq!(result.metrics.win_condition, "turn_limit");
        assert_eq!(result.metrics.winner, None);
        assert_eq!(result.metrics.rounds.len(), 1);
    }

    #[test]
    fn test_passive_loadout_hits_turn_limit() {
        let mut scenario = Scenario::duel();
        for team in &mut scenario.session.teams {
            team.units[0].loadout = [Some("heal_team".to_string()), None, None];
        }
        scenario.max_turns = 10;
        let result = run_game(&GameConfig::new(scenario, 0)).unwrap();
        assert_eq!(result.metrics.win_condition, "turn_limit");
    }

    #[test]
    fn test_mutual_self_destruct_is_a_wipeout() {
        let mut scenario = Scenario::duel();
        scenario.config.orchestrator = OrchestratorConfig::fixed_order();
        for team in &mut scenario.session.teams {
            team.units[0].loadout = [Some("explode".to_string()), None, None];
        }
        scenario.session.teams[1].units[0].max_health = 50;

        let result = run_game(&GameConfig::new(scenario, 0)).unwrap();
        assert_eq!(result.metrics.win_condition, "wipeout");
        assert_eq!(result.metrics.winner, None);
        assert_eq!(result.metrics.rounds.len(), 1);
        assert_eq!(result.metrics.rounds[0].winner, None);
    }
}
