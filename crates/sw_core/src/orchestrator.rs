//! Turn orchestration state machine.
//!
//! The [`TurnOrchestrator`] owns whose turn it is and which [`Phase`] is
//! active. It is the only writer of that pair; every other component
//! observes it and requests changes through three calls:
//! [`end_movement_phase`](TurnOrchestrator::end_movement_phase),
//! [`notify_action_resolved`](TurnOrchestrator::notify_action_resolved) and
//! [`end_current_turn`](TurnOrchestrator::end_current_turn).
//!
//! # Turn cycle
//!
//! ```text
//! Starting | NextUnit --transition--> Movement --> Action --> TurnEnd --> (next actor)
//! ```
//!
//! Stale calls (wrong phase, wrong actor) are ignored without touching
//! state. They are normal when callbacks from an earlier turn arrive late.
//!
//! # Example
//!
//! ```
//! use sw_core::actor::{Actor, ActorRegistry};
//! use sw_core::follow::NoFollow;
//! use sw_core::orchestrator::{OrchestratorConfig, TurnOrchestrator};
//! use sw_core::phase::Phase;
//!
//! let mut actors = ActorRegistry::new();
//! actors.insert(Actor::new("Red", 0, 100));
//! actors.insert(Actor::new("Blue", 1, 100));
//!
//! let mut turns = TurnOrchestrator::new(OrchestratorConfig::fixed_order());
//! turns.build_turn_order(&actors);
//! turns.start_turns(&mut actors).unwrap();
//! assert_eq!(turns.phase(), Phase::Movement);
//!
//! turns.end_movement_phase();
//! assert_eq!(turns.phase(), Phase::Action);
//!
//! let first = turns.active_actor().unwrap();
//! turns.end_current_turn(&mut actors, &NoFollow);
//! assert_ne!(turns.active_actor(), Some(first));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ActorRegistry, TeamId};
use crate::error::{GameError, Result};
use crate::events::{EventBus, EventKind, ListenerId, TurnEvent};
use crate::follow::FollowStatus;
use crate::math::Vec3Fixed;
use crate::phase::Phase;
use crate::team::{IdentityShuffler, SeededShuffler, TeamQueue, TurnShuffler};

/// Orchestrator behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Shuffle team order and each team's internal order.
    pub randomize_turn_order: bool,
    /// Seed for the shuffle.
    pub seed: u64,
    /// Enter `Movement` right after dispatch instead of waiting for
    /// [`TurnOrchestrator::complete_transition`].
    pub auto_begin_movement: bool,
    /// Request the end of the turn as soon as `TurnEnd` is entered.
    pub auto_end_turn: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            randomize_turn_order: true,
            seed: 0,
            auto_begin_movement: true,
            auto_end_turn: true,
        }
    }
}

impl OrchestratorConfig {
    /// Unshuffled order: teams ascending, members by actor ID.
    #[must_use]
    pub fn fixed_order() -> Self {
        Self {
            randomize_turn_order: false,
            ..Self::default()
        }
    }

    /// Shuffled order from a specific seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            randomize_turn_order: true,
            seed,
            ..Self::default()
        }
    }
}

/// Where and when the active actor's turn began.
///
/// Movement collaborators read this to leash the actor around its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAnchor {
    /// Actor whose turn this is.
    pub actor: ActorId,
    /// Position at `begin_turn`.
    pub position: Vec3Fixed,
    /// Sequential turn number (first turn is 1).
    pub turn: u64,
}

/// Result of [`TurnOrchestrator::advance_to_next_unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// A new actor's turn began.
    Dispatched(ActorId),
    /// Exactly one team remains; the match is over.
    TeamWon(TeamId),
    /// No living actor in any queue; state unchanged.
    Exhausted,
    /// The match already ended; nothing happens.
    Halted,
}

/// Result of [`TurnOrchestrator::end_current_turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTurnOutcome {
    /// Not started, already won, or no active actor.
    Ignored,
    /// A follow is holding the living actor's turn open.
    Deferred,
    /// The request moved `Movement` to `Action` instead.
    MovementEnded,
    /// The turn ended; carries what happened next.
    Ended(AdvanceOutcome),
}

impl EndTurnOutcome {
    /// Whether the active turn actually ended.
    #[must_use]
    pub const fn ended(&self) -> bool {
        matches!(self, Self::Ended(_))
    }
}

/// The turn/phase state machine.
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    team_order: Vec<TeamId>,
    queues: BTreeMap<TeamId, TeamQueue>,
    team_cursor: Option<usize>,
    active: Option<ActorId>,
    phase: Phase,
    started: bool,
    winner: Option<TeamId>,
    anchor: Option<TurnAnchor>,
    turn_number: u64,
    resolving: bool,
    events: EventBus,
    shuffler: Box<dyn TurnShuffler>,
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("team_order", &self.team_order)
            .field("active", &self.active)
            .field("phase", &self.phase)
            .field("started", &self.started)
            .field("winner", &self.winner)
            .field("turn_number", &self.turn_number)
            .finish_non_exhaustive()
    }
}

impl Default for TurnOrchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl TurnOrchestrator {
    /// Create an idle orchestrator. The shuffler follows the config.
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        let shuffler: Box<dyn TurnShuffler> = if config.randomize_turn_order {
            Box::new(SeededShuffler::new(config.seed))
        } else {
            Box::new(IdentityShuffler)
        };
        Self::with_shuffler(config, shuffler)
    }

    /// Create an idle orchestrator with an injected shuffler.
    #[must_use]
    pub fn with_shuffler(config: OrchestratorConfig, shuffler: Box<dyn TurnShuffler>) -> Self {
        Self {
            config,
            team_order: Vec::new(),
            queues: BTreeMap::new(),
            team_cursor: None,
            active: None,
            phase: Phase::Idle,
            started: false,
            winner: None,
            anchor: None,
            turn_number: 0,
            resolving: false,
            events: EventBus::new(),
            shuffler,
        }
    }

    // ------------------------------------------------------------------
    // Read-only accessors
    // ------------------------------------------------------------------

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Actor whose turn it is.
    #[must_use]
    pub const fn active_actor(&self) -> Option<ActorId> {
        self.active
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Anchor captured when the active turn began.
    #[must_use]
    pub const fn turn_anchor(&self) -> Option<TurnAnchor> {
        self.anchor
    }

    /// Winning team, once decided.
    #[must_use]
    pub const fn winner(&self) -> Option<TeamId> {
        self.winner
    }

    /// Whether `start_turns` succeeded and the match has not been rebuilt.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Number of turns dispatched since the last build.
    #[must_use]
    pub const fn turn_number(&self) -> u64 {
        self.turn_number
    }

    /// Order in which teams alternate.
    #[must_use]
    pub fn team_order(&self) -> &[TeamId] {
        &self.team_order
    }

    /// A team's queue.
    #[must_use]
    pub fn queue(&self, team: TeamId) -> Option<&TeamQueue> {
        self.queues.get(&team)
    }

    /// Whether `actor` is the active actor in its `Action` phase.
    #[must_use]
    pub fn is_action_phase_of(&self, actor: ActorId) -> bool {
        self.active == Some(actor) && self.phase == Phase::Action
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Register a listener for one event kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&TurnEvent) + Send + 'static,
    {
        self.events.subscribe(kind, listener)
    }

    /// Remove a listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Emit an event on the orchestrator's bus.
    ///
    /// Collaborators use this for damage, death and follow notices so
    /// that listeners see a single ordered stream.
    pub fn emit(&mut self, event: TurnEvent) {
        self.events.emit(event);
    }

    /// Take all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<TurnEvent> {
        self.events.drain()
    }

    /// Events emitted since the last drain.
    #[must_use]
    pub fn pending_events(&self) -> &[TurnEvent] {
        self.events.pending()
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    /// Group the living actors into per-team queues and reset to idle.
    ///
    /// Team order and each team's internal order go through the shuffler.
    /// Does not start any turn.
    pub fn build_turn_order(&mut self, actors: &ActorRegistry) {
        let mut grouped: BTreeMap<TeamId, Vec<ActorId>> = BTreeMap::new();
        for id in actors.living() {
            if let Some(actor) = actors.get(id) {
                grouped.entry(actor.team()).or_default().push(id);
            }
        }

        let mut team_order: Vec<TeamId> = grouped.keys().copied().collect();
        self.shuffler.shuffle_teams(&mut team_order);

        self.queues.clear();
        for (team, mut members) in grouped {
            self.shuffler.shuffle_members(&mut members);
            self.queues.insert(team, TeamQueue::new(team, members));
        }

        self.team_order = team_order;
        self.team_cursor = None;
        self.active = None;
        self.phase = Phase::Idle;
        self.started = false;
        self.winner = None;
        self.anchor = None;
        self.turn_number = 0;
        self.resolving = false;

        tracing::info!(
            teams = self.team_order.len(),
            actors = self.queues.values().map(|q| q.members().len()).sum::<usize>(),
            "Turn order built"
        );
    }

    /// Dispatch the first turn.
    ///
    /// An empty roster is a setup error: it is logged, reported, and the
    /// orchestrator stays idle.
    pub fn start_turns(&mut self, actors: &mut ActorRegistry) -> Result<()> {
        if self.queues.values().all(TeamQueue::is_empty) {
            tracing::warn!("Cannot start turns: no actors in any team queue");
            return Err(GameError::EmptyRoster);
        }

        self.started = true;
        self.advance_to_next_unit(actors, false);
        Ok(())
    }

    /// Drop an actor from its queue after its death sequence completes.
    pub fn remove_actor(&mut self, actor: ActorId) -> bool {
        self.queues.values_mut().any(|q| q.remove(actor))
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Pick the next living actor, team by team, or declare a winner.
    pub fn advance_to_next_unit(
        &mut self,
        actors: &mut ActorRegistry,
        mid_match: bool,
    ) -> AdvanceOutcome {
        if self.winner.is_some() {
            return AdvanceOutcome::Halted;
        }

        if let Some(team) = Self::find_winner(actors) {
            self.finish(team);
            return AdvanceOutcome::TeamWon(team);
        }

        let team_count = self.team_order.len();
        let start = self.team_cursor.map_or(0, |c| c + 1);
        for step in 0..team_count {
            let index = (start + step) % team_count;
            let team = self.team_order[index];
            let Some(queue) = self.queues.get_mut(&team) else {
                continue;
            };
            if let Some(next) = queue.next_living(|id| actors.is_alive(id)) {
                self.team_cursor = Some(index);
                self.dispatch(actors, next, mid_match);
                return AdvanceOutcome::Dispatched(next);
            }
        }

        tracing::warn!("No living actor found in any team queue");
        AdvanceOutcome::Exhausted
    }

    fn dispatch(&mut self, actors: &mut ActorRegistry, id: ActorId, mid_match: bool) {
        let Some(actor) = actors.get_mut(id) else {
            return;
        };
        actor.begin_turn();
        let team = actor.team();
        let position = actor.position;

        self.turn_number += 1;
        self.active = Some(id);
        self.anchor = Some(TurnAnchor {
            actor: id,
            position,
            turn: self.turn_number,
        });

        let phase = if mid_match {
            Phase::NextUnit
        } else {
            Phase::Starting
        };
        self.set_phase(phase);

        tracing::info!(actor = id, team, turn = self.turn_number, "Turn started");
        self.events.emit(TurnEvent::TurnStarted(id));

        #[cfg(feature = "debug-validation")]
        debug_assert!(
            actors.turn_active_count() <= 1,
            "more than one actor is turn-active"
        );

        if self.config.auto_begin_movement {
            self.complete_transition();
        }
    }

    /// Finish the turn-start transition and enter `Movement`.
    pub fn complete_transition(&mut self) -> bool {
        if self.active.is_none() || !self.phase.is_transition() {
            return false;
        }
        self.set_phase(Phase::Movement);
        true
    }

    // ------------------------------------------------------------------
    // Phase requests
    // ------------------------------------------------------------------

    /// Move from `Movement` to `Action`. Ignored in any other phase.
    pub fn end_movement_phase(&mut self) -> bool {
        if self.phase != Phase::Movement {
            return false;
        }
        self.set_phase(Phase::Action);
        true
    }

    /// The active actor's ability has fully resolved.
    ///
    /// Ignored unless `actor` is the active actor in `Action`. A stale
    /// call from an actor that died mid-resolution is expected.
    pub fn notify_action_resolved(
        &mut self,
        actor: ActorId,
        actors: &mut ActorRegistry,
        follow: &dyn FollowStatus,
    ) -> bool {
        if !self.is_action_phase_of(actor) {
            tracing::trace!(actor, phase = %self.phase, "Ignoring stale action resolution");
            return false;
        }
        self.set_phase(Phase::TurnEnd);
        if self.config.auto_end_turn {
            self.end_current_turn(actors, follow);
        }
        true
    }

    /// Request the end of the active turn.
    ///
    /// A living actor's turn is held open while a follow is active; the
    /// caller keeps asking until it is released. A dead actor always
    /// gives up its turn so a death mid-ability cannot stall the match.
    pub fn end_current_turn(
        &mut self,
        actors: &mut ActorRegistry,
        follow: &dyn FollowStatus,
    ) -> EndTurnOutcome {
        if !self.started || self.winner.is_some() {
            return EndTurnOutcome::Ignored;
        }
        let Some(id) = self.active else {
            return EndTurnOutcome::Ignored;
        };

        let alive = actors.is_alive(id);
        if alive && follow.is_follow_active() {
            tracing::trace!(actor = id, "End of turn deferred by active follow");
            return EndTurnOutcome::Deferred;
        }

        if !alive {
            let still_active = actors.get_mut(id).is_some_and(|a| a.end_turn());
            if still_active {
                tracing::info!(actor = id, "Turn ended by death");
                self.events.emit(TurnEvent::TurnEnded(id));
            }
            let next = self.advance_to_next_unit(actors, true);
            return EndTurnOutcome::Ended(next);
        }

        if self.phase == Phase::Movement {
            self.end_movement_phase();
            return EndTurnOutcome::MovementEnded;
        }

        if self.phase.can_advance_to(Phase::TurnEnd) {
            self.set_phase(Phase::TurnEnd);
        }
        if let Some(actor) = actors.get_mut(id) {
            actor.end_turn();
        }
        tracing::info!(actor = id, turn = self.turn_number, "Turn ended");
        self.events.emit(TurnEvent::TurnEnded(id));

        let next = self.advance_to_next_unit(actors, true);
        EndTurnOutcome::Ended(next)
    }

    /// React to an actor's health reaching zero.
    ///
    /// The active actor's turn is released at once. Any other death
    /// re-checks the win condition so the match ends on the killing blow,
    /// unless an ability is still resolving: its remaining effects may
    /// kill more actors, so the check waits for [`end_resolution`].
    ///
    /// [`end_resolution`]: TurnOrchestrator::end_resolution
    pub fn on_actor_died(
        &mut self,
        actor: ActorId,
        actors: &mut ActorRegistry,
        follow: &dyn FollowStatus,
    ) -> EndTurnOutcome {
        if !self.started || self.winner.is_some() {
            return EndTurnOutcome::Ignored;
        }

        if self.active == Some(actor) {
            return self.end_current_turn(actors, follow);
        }

        if self.resolving {
            tracing::trace!(actor, "Win check deferred until the ability resolves");
            return EndTurnOutcome::Ignored;
        }

        match Self::find_winner(actors) {
            Some(team) => {
                self.end_turn_and_finish(actors, team);
                EndTurnOutcome::Ended(AdvanceOutcome::TeamWon(team))
            }
            None => EndTurnOutcome::Ignored,
        }
    }

    /// An ability started resolving.
    pub fn begin_resolution(&mut self) {
        self.resolving = true;
    }

    /// The ability finished. Settles any win its deaths decided.
    ///
    /// Returns the team that won as a result.
    pub fn end_resolution(&mut self, actors: &mut ActorRegistry) -> Option<TeamId> {
        self.resolving = false;
        if !self.started || self.winner.is_some() {
            return None;
        }
        let team = Self::find_winner(actors)?;
        self.end_turn_and_finish(actors, team);
        Some(team)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// The single team with living actors, if exactly one exists.
    #[must_use]
    pub fn find_winner(actors: &ActorRegistry) -> Option<TeamId> {
        let living_teams: BTreeSet<TeamId> = actors
            .iter()
            .filter(|(_, a)| a.is_alive())
            .map(|(_, a)| a.team())
            .collect();

        if living_teams.len() == 1 {
            living_teams.into_iter().next()
        } else {
            None
        }
    }

    fn end_turn_and_finish(&mut self, actors: &mut ActorRegistry, team: TeamId) {
        if let Some(id) = self.active {
            if actors.get_mut(id).is_some_and(|a| a.end_turn()) {
                self.events.emit(TurnEvent::TurnEnded(id));
            }
        }
        self.finish(team);
    }

    fn finish(&mut self, team: TeamId) {
        self.winner = Some(team);
        self.active = None;
        self.anchor = None;
        self.set_phase(Phase::Idle);
        tracing::info!(team, turns = self.turn_number, "Team won");
        self.events.emit(TurnEvent::TeamWon(team));
    }

    fn set_phase(&mut self, next: Phase) {
        if self.phase == next {
            return;
        }
        debug_assert!(
            self.phase.can_advance_to(next),
            "phase regression {} -> {}",
            self.phase,
            next
        );
        tracing::debug!(from = %self.phase, to = %next, actor = ?self.active, "Phase changed");
        self.phase = next;
        self.events.emit(TurnEvent::PhaseChanged(next));
    }
}
