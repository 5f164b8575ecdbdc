//! Match runtime.
//!
//! [`Match`] wires the orchestrator, the shared [`World`] and one
//! [`ActionSelectionController`] per actor together, and exposes the
//! input surface a player (or an automated strategy) drives. Every
//! input call pumps the resulting notifications to the controllers
//! before returning, so controllers never act on a stale phase.
//!
//! # Determinism
//!
//! Given the same session, catalog, config and input script, a match
//! produces the same [`Match::state_hash`] on every run.
//!
//! # Example
//!
//! ```
//! use sw_core::game::{Match, MatchConfig};
//! use sw_core::ability::AbilityCatalog;
//! use sw_core::session::MatchSession;
//! use sw_core::phase::Phase;
//!
//! let mut game = Match::new(
//!     MatchSession::default_setup(),
//!     AbilityCatalog::standard(),
//!     MatchConfig::default(),
//! )
//! .unwrap();
//! game.start_round().unwrap();
//! assert_eq!(game.phase(), Phase::Movement);
//!
//! game.end_movement();
//! game.select_slot(0);
//! let enemy = game.enemies_of_active()[0];
//! game.press_confirm(Some(enemy));
//! assert_eq!(game.actors().get(enemy).unwrap().health().current, 88);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ability::{AbilityCatalog, ActionContext};
use crate::actor::{Actor, ActorId, ActorRegistry, DamageReport, TeamId};
use crate::channel::ActiveChannel;
use crate::controller::{ActionSelectionController, ConfirmOutcome};
use crate::error::{GameError, Result};
use crate::events::TurnEvent;
use crate::follow::{FollowConfig, FollowHandle};
use crate::math::Vec3Fixed;
use crate::orchestrator::{EndTurnOutcome, OrchestratorConfig, TurnOrchestrator};
use crate::phase::Phase;
use crate::session::MatchSession;
use crate::world::{Projectile, World};

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Turn order and phase automation.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Follow release timing.
    #[serde(default)]
    pub follow: FollowConfig,
}

impl MatchConfig {
    /// Config with a seeded shuffle.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            orchestrator: OrchestratorConfig::seeded(seed),
            follow: FollowConfig::default(),
        }
    }
}

/// Serializable view of a match at one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Format version.
    pub version: u32,
    /// Round number (first is 1).
    pub round: u32,
    /// Ticks elapsed in the round.
    pub tick: u64,
    /// Turns dispatched in the round.
    pub turn_number: u64,
    /// Active actor.
    pub active: Option<ActorId>,
    /// Current phase.
    pub phase: Phase,
    /// Round winner, once decided.
    pub winner: Option<TeamId>,
    /// Actors in ID order.
    pub actors: Vec<Actor>,
    /// Follow holding the turn.
    pub follow: Option<FollowHandle>,
    /// Running channels.
    pub channels: Vec<ActiveChannel>,
    /// Projectiles in flight.
    pub projectiles: Vec<Projectile>,
}

impl MatchSnapshot {
    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize snapshot: {e}")))
    }

    /// Decode with bincode, rejecting other versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize snapshot: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(GameError::InvalidState(format!(
                "Snapshot version mismatch: expected {SNAPSHOT_VERSION}, got {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

/// A running match.
#[derive(Debug)]
pub struct Match {
    config: MatchConfig,
    session: MatchSession,
    catalog: AbilityCatalog,
    world: World,
    turns: TurnOrchestrator,
    controllers: BTreeMap<ActorId, ActionSelectionController>,
    log: Vec<TurnEvent>,
    round: u32,
    round_recorded: bool,
}

impl Match {
    /// Validate the roster against the catalog and prepare an idle match.
    pub fn new(session: MatchSession, catalog: AbilityCatalog, config: MatchConfig) -> Result<Self> {
        session.validate(&catalog)?;
        Ok(Self {
            turns: TurnOrchestrator::new(config.orchestrator),
            world: World::new(ActorRegistry::new(), config.follow),
            config,
            session,
            catalog,
            controllers: BTreeMap::new(),
            log: Vec::new(),
            round: 0,
            round_recorded: false,
        })
    }

    // ------------------------------------------------------------------
    // Rounds
    // ------------------------------------------------------------------

    /// Spawn the roster and dispatch the first turn of a new round.
    pub fn start_round(&mut self) -> Result<()> {
        if self.session.is_complete() {
            return Err(GameError::InvalidState("match already decided".into()));
        }
        self.round += 1;
        self.round_recorded = false;

        let mut actors = ActorRegistry::new();
        let spawned = self.session.spawn_round(&mut actors);

        let mut controllers = BTreeMap::new();
        for id in spawned {
            let loadout = self
                .session
                .loadout_of(id)
                .ok_or(GameError::UnknownActor(id))?;
            let controller =
                ActionSelectionController::from_loadout(id, loadout, &self.catalog)?;
            controllers.insert(id, controller);
        }
        self.controllers = controllers;

        let mut orchestrator = self.config.orchestrator;
        orchestrator.seed = orchestrator.seed.wrapping_add(u64::from(self.round - 1));
        self.turns = TurnOrchestrator::new(orchestrator);
        self.world = World::new(actors, self.config.follow);

        self.turns.build_turn_order(&self.world.actors);
        self.turns.start_turns(&mut self.world.actors)?;
        self.pump_events();
        Ok(())
    }

    /// Record the round's winner in the session once it is decided.
    ///
    /// Calling again for the same round returns the winner without
    /// recording it twice.
    pub fn finish_round(&mut self) -> Result<Option<TeamId>> {
        let Some(winner) = self.turns.winner() else {
            return Ok(None);
        };
        if self.round_recorded {
            return Ok(Some(winner));
        }
        self.round_recorded = true;
        self.world.clear_transient();
        self.session.clear_dead(&self.world.actors);
        self.session.record_round(winner)?;
        Ok(Some(winner))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Roster and round results.
    #[must_use]
    pub const fn session(&self) -> &MatchSession {
        &self.session
    }

    /// Mutable roster, for loadout changes between rounds.
    pub fn session_mut(&mut self) -> &mut MatchSession {
        &mut self.session
    }

    /// Ability catalog.
    #[must_use]
    pub const fn catalog(&self) -> &AbilityCatalog {
        &self.catalog
    }

    /// Shared combat state.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// All actors.
    #[must_use]
    pub const fn actors(&self) -> &ActorRegistry {
        &self.world.actors
    }

    /// Turn state.
    #[must_use]
    pub const fn turns(&self) -> &TurnOrchestrator {
        &self.turns
    }

    /// Controller for an actor.
    #[must_use]
    pub fn controller(&self, actor: ActorId) -> Option<&ActionSelectionController> {
        self.controllers.get(&actor)
    }

    /// Active actor.
    #[must_use]
    pub const fn active_actor(&self) -> Option<ActorId> {
        self.turns.active_actor()
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.turns.phase()
    }

    /// Round winner, once decided.
    #[must_use]
    pub const fn winner(&self) -> Option<TeamId> {
        self.turns.winner()
    }

    /// Current round number (first is 1).
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Living enemies of the active actor, in ID order.
    #[must_use]
    pub fn enemies_of_active(&self) -> Vec<ActorId> {
        let Some(team) = self
            .active_actor()
            .and_then(|id| self.world.actors.get(id))
            .map(Actor::team)
        else {
            return Vec::new();
        };
        self.world
            .actors
            .living()
            .into_iter()
            .filter(|id| self.world.actors.get(*id).is_some_and(|a| a.team() != team))
            .collect()
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Choose an ability slot for the active actor.
    pub fn select_slot(&mut self, slot: usize) -> bool {
        let Some(actor) = self.active_actor() else {
            return false;
        };
        let Some(controller) = self.controllers.get_mut(&actor) else {
            return false;
        };
        let changed = controller.select_slot(slot, &self.world.actors, &self.turns);
        self.pump_events();
        changed
    }

    /// Press confirm on the active actor's selection.
    pub fn press_confirm(&mut self, target: Option<ActorId>) -> ConfirmOutcome {
        self.confirm(target, false)
    }

    /// Release confirm on a charging selection.
    pub fn release_confirm(&mut self, target: Option<ActorId>) -> ConfirmOutcome {
        self.confirm(target, true)
    }

    fn confirm(&mut self, target: Option<ActorId>, release: bool) -> ConfirmOutcome {
        let Some(actor) = self.active_actor() else {
            return ConfirmOutcome::Ignored;
        };
        let Some(controller) = self.controllers.get_mut(&actor) else {
            return ConfirmOutcome::Ignored;
        };
        let mut ctx = ActionContext {
            world: &mut self.world,
            turns: &mut self.turns,
            target,
            charge: None,
        };
        let outcome = if release {
            controller.release_confirm(&mut ctx)
        } else {
            controller.press_confirm(&mut ctx)
        };
        self.pump_events();
        outcome
    }

    /// Request the end of the active turn.
    pub fn end_turn(&mut self) -> EndTurnOutcome {
        let outcome = self
            .turns
            .end_current_turn(&mut self.world.actors, &self.world.follow);
        self.pump_events();
        outcome
    }

    /// Leave the movement phase.
    pub fn end_movement(&mut self) -> bool {
        let moved = self.turns.end_movement_phase();
        self.pump_events();
        moved
    }

    /// Signal that the turn-start transition finished playing.
    pub fn transition_complete(&mut self) -> bool {
        let done = self.turns.complete_transition();
        self.pump_events();
        done
    }

    /// Cancel the active actor's channel.
    pub fn cancel_channel(&mut self) -> bool {
        let Some(actor) = self.active_actor() else {
            return false;
        };
        let ended = self
            .world
            .channels
            .cancel(actor, &mut self.turns, &mut self.world.actors, &self.world.follow)
            .is_some();
        self.pump_events();
        ended
    }

    /// Report an actor's position from the movement layer.
    pub fn set_position(&mut self, actor: ActorId, position: Vec3Fixed) -> Result<()> {
        let unit = self
            .world
            .actors
            .get_mut(actor)
            .ok_or(GameError::UnknownActor(actor))?;
        unit.position = position;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------

    /// Advance one tick.
    ///
    /// Lands projectiles, releases follows, burns channels and the charge
    /// ramp, then retries a turn end that a follow was holding back.
    pub fn tick(&mut self) {
        self.world.tick(&mut self.turns);

        if let Some(controller) = self
            .active_actor()
            .and_then(|id| self.controllers.get_mut(&id))
        {
            controller.tick(&self.world.actors, &self.turns);
        }

        if self.turns.phase() == Phase::TurnEnd && self.turns.config().auto_end_turn {
            self.turns
                .end_current_turn(&mut self.world.actors, &self.world.follow);
        }
        self.pump_events();
    }

    /// Damage an actor from outside the ability system.
    pub fn apply_damage(
        &mut self,
        target: ActorId,
        amount: u32,
        source: Option<ActorId>,
        label: &str,
    ) -> DamageReport {
        let report = self
            .world
            .apply_damage(&mut self.turns, target, amount, source, label);
        self.pump_events();
        report
    }

    /// Kill an actor that left the arena.
    pub fn kill_out_of_bounds(&mut self, actor: ActorId) -> DamageReport {
        let report = self.world.kill_out_of_bounds(&mut self.turns, actor);
        self.pump_events();
        report
    }

    /// Deliver pending notifications to every controller.
    pub fn pump_events(&mut self) -> usize {
        let events = self.turns.drain_events();
        for event in &events {
            for controller in self.controllers.values_mut() {
                controller.on_event(event);
            }
        }
        let count = events.len();
        self.log.extend(events);
        count
    }

    /// Take the notifications delivered since the last call.
    pub fn drain_events(&mut self) -> Vec<TurnEvent> {
        std::mem::take(&mut self.log)
    }

    // ------------------------------------------------------------------
    // State capture
    // ------------------------------------------------------------------

    /// Capture the current state.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        let actors = self
            .world
            .actors
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.world.actors.get(id).cloned())
            .collect();
        let channels = self
            .world
            .actors
            .sorted_ids()
            .into_iter()
            .filter_map(|id| self.world.channels.get(id).copied())
            .collect();

        MatchSnapshot {
            version: SNAPSHOT_VERSION,
            round: self.round,
            tick: self.world.tick_count(),
            turn_number: self.turns.turn_number(),
            active: self.turns.active_actor(),
            phase: self.turns.phase(),
            winner: self.turns.winner(),
            actors,
            follow: self.world.follow.current_handle(),
            channels,
            projectiles: self.world.projectiles().to_vec(),
        }
    }

    /// Hash of the current state for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.round.hash(&mut hasher);
        self.world.tick_count().hash(&mut hasher);
        self.turns.turn_number().hash(&mut hasher);
        self.turns.active_actor().hash(&mut hasher);
        self.turns.phase().hash(&mut hasher);
        self.turns.winner().hash(&mut hasher);

        let ids = self.world.actors.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(actor) = self.world.actors.get(id) {
                id.hash(&mut hasher);
                actor.team().hash(&mut hasher);
                actor.is_alive().hash(&mut hasher);
                actor.health().hash(&mut hasher);
                actor.is_turn_active().hash(&mut hasher);
                actor.position.x.to_bits().hash(&mut hasher);
                actor.position.y.to_bits().hash(&mut hasher);
                actor.position.z.to_bits().hash(&mut hasher);
                actor.last_attacker().hash(&mut hasher);
            }
            if let Some(controller) = self.controllers.get(&id) {
                controller.state().hash(&mut hasher);
                controller.action_used().hash(&mut hasher);
            }
        }

        self.world.follow.current_handle().hash(&mut hasher);
        for projectile in self.world.projectiles() {
            projectile.id.hash(&mut hasher);
            projectile.land_tick.hash(&mut hasher);
            projectile.force.to_bits().hash(&mut hasher);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{TeamSetup, UnitSlot};

    fn duel(loadout: [Option<&str>; 3]) -> Match {
        duel_with_health(loadout, [100, 100])
    }

    fn duel_with_health(loadout: [Option<&str>; 3], health: [u32; 2]) -> Match {
        let loadout = loadout.map(|s| s.map(str::to_string));
        let session = MatchSession {
            teams: (0..2)
                .map(|t| TeamSetup {
                    name: format!("T{t}"),
                    units: vec![UnitSlot {
                        max_health: health[t],
                        ..UnitSlot::new(format!("U{t}"), loadout.clone())
                    }],
                })
                .collect(),
            rounds_to_play: 1,
            round_winners: Vec::new(),
        };
        let config = MatchConfig {
            orchestrator: OrchestratorConfig::fixed_order(),
            follow: FollowConfig { return_delay_ticks: 2 },
        };
        let mut game = Match::new(session, AbilityCatalog::standard(), config).unwrap();
        game.start_round().unwrap();
        game
    }

    #[test]
    fn test_invalid_session_is_rejected() {
        let mut session = MatchSession::default_setup();
        session.teams[0].units[0].loadout[0] = Some("laser".into());
        let result = Match::new(session, AbilityCatalog::standard(), MatchConfig::default());
        assert!(matches!(result, Err(GameError::UnknownAbility(_))));
    }

    #[test]
    fn test_grenade_defers_turn_until_follow_returns() {
        let mut game = duel([Some("grenade"), None, None]);
        game.end_movement();
        game.select_slot(0);
        assert_eq!(game.press_confirm(Some(2)), ConfirmOutcome::Charging);
        game.tick();
        game.release_confirm(Some(2));

        assert_eq!(game.phase(), Phase::TurnEnd);
        assert_eq!(game.end_turn(), EndTurnOutcome::Deferred);

        for _ in 0..60 {
            game.tick();
            assert_eq!(game.active_actor(), Some(1));
        }
        assert_eq!(game.actors().get(2).unwrap().health().current, 80);

        // Return delay.
        game.tick();
        assert_eq!(game.active_actor(), Some(1));
        game.tick();
        assert_eq!(game.active_actor(), Some(2));
        assert_eq!(game.phase(), Phase::Movement);
    }

    #[test]
    fn test_jetpack_holds_action_until_fuel_runs_out() {
        let mut game = duel([Some("jetpack"), None, None]);
        game.end_movement();
        game.select_slot(0);
        game.press_confirm(None);

        for _ in 0..59 {
            game.tick();
            assert_eq!(game.phase(), Phase::Action);
        }
        game.tick();
        assert_eq!(game.active_actor(), Some(2));
    }

    #[test]
    fn test_cancel_channel_ends_action() {
        let mut game = duel([Some("jetpack"), None, None]);
        game.end_movement();
        game.select_slot(0);
        game.press_confirm(None);
        assert!(game.cancel_channel());
        assert_eq!(game.active_actor(), Some(2));
    }

    #[test]
    fn test_explode_hands_win_to_survivor() {
        let mut game = duel([Some("explode"), None, None]);
        game.end_movement();
        game.select_slot(0);
        game.press_confirm(None);

        assert_eq!(game.actors().get(2).unwrap().health().current, 20);
        assert!(!game.actors().is_alive(1));
        assert_eq!(game.winner(), Some(1));
        assert_eq!(game.active_actor(), None);
        let won = game
            .drain_events()
            .iter()
            .filter(|e| matches!(e, TurnEvent::TeamWon(_)))
            .count();
        assert_eq!(won, 1);
    }

    #[test]
    fn test_explode_killing_everyone_has_no_winner() {
        let mut game = duel_with_health([Some("explode"), None, None], [100, 50]);
        game.end_movement();
        game.select_slot(0);
        game.press_confirm(None);

        assert!(game.actors().living().is_empty());
        assert_eq!(game.winner(), None);
        assert!(!game
            .drain_events()
            .iter()
            .any(|e| matches!(e, TurnEvent::TeamWon(_))));
        assert_eq!(game.finish_round().unwrap(), None);
        assert!(game.session().round_winners.is_empty());
    }

    #[test]
    fn test_killing_blow_wins_once_the_ability_resolves() {
        let mut game = duel_with_health([Some("punch"), None, None], [100, 10]);
        game.end_movement();
        game.select_slot(0);
        game.drain_events();
        game.press_confirm(Some(2));

        assert_eq!(game.winner(), Some(0));
        assert_eq!(game.active_actor(), None);
        let events = game.drain_events();
        let died = events
            .iter()
            .position(|e| matches!(e, TurnEvent::ActorDied { actor: 2, .. }))
            .unwrap();
        let ended = events
            .iter()
            .position(|e| *e == TurnEvent::TurnEnded(1))
            .unwrap();
        let won = events
            .iter()
            .position(|e| *e == TurnEvent::TeamWon(0))
            .unwrap();
        assert!(died < ended && ended < won);
        assert_eq!(
            events.iter().filter(|e| matches!(e, TurnEvent::TeamWon(_))).count(),
            1
        );
    }

    #[test]
    fn test_finish_round_records_winner() {
        let mut game = duel([Some("punch"), None, None]);
        game.kill_out_of_bounds(2);
        assert_eq!(game.winner(), Some(0));
        assert_eq!(game.finish_round().unwrap(), Some(0));
        assert_eq!(game.session().match_winner(), Some(0));
        assert!(game.start_round().is_err());
    }

    #[test]
    fn test_controllers_see_every_event() {
        let mut game = duel([Some("punch"), None, None]);
        game.end_movement();
        game.select_slot(0);
        game.press_confirm(Some(2));

        let events = game.drain_events();
        assert!(events.contains(&TurnEvent::TurnEnded(1)));
        assert!(events.contains(&TurnEvent::TurnStarted(2)));
        assert!(!game.controller(1).unwrap().action_used());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut game = duel([Some("grenade"), None, None]);
        game.end_movement();
        game.select_slot(0);
        game.press_confirm(Some(2));
        game.release_confirm(Some(2));

        let snapshot = game.snapshot();
        let bytes = snapshot.to_bytes().unwrap();
        let restored = MatchSnapshot::from_bytes(&bytes).unwrap();
        assert_eq!(restored, snapshot);
        assert_eq!(restored.projectiles.len(), 1);
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut game = duel([Some("punch"), None, None]);
        let before = game.state_hash();
        assert_eq!(before, game.state_hash());
        game.end_movement();
        assert_ne!(before, game.state_hash());
    }
}
