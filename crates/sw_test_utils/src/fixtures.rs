//! Test fixtures and helpers.
//!
//! Pre-built rosters, started matches and stand-in abilities for
//! consistent testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fixed::types::I32F32;
use sw_core::ability::{AbilityCatalog, Action, ActionContext};
use sw_core::actor::{Actor, ActorId, ActorRegistry, TeamId};
use sw_core::events::{EventKind, TurnEvent};
use sw_core::follow::FollowConfig;
use sw_core::game::{Match, MatchConfig};
use sw_core::orchestrator::{OrchestratorConfig, TurnOrchestrator};
use sw_core::session::{Loadout, MatchSession, TeamSetup, UnitSlot};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Fixed turn order and a short follow return delay.
#[must_use]
pub fn test_config() -> MatchConfig {
    MatchConfig {
        orchestrator: OrchestratorConfig::fixed_order(),
        follow: FollowConfig {
            return_delay_ticks: 2,
        },
    }
}

/// Build a slot loadout from up to three ability ids.
#[must_use]
pub fn loadout(ids: &[&str]) -> Loadout {
    let mut slots: Loadout = Default::default();
    for (slot, id) in slots.iter_mut().zip(ids) {
        *slot = Some((*id).to_string());
    }
    slots
}

/// A session with one team per entry of `sizes`, every unit sharing a loadout.
#[must_use]
pub fn session_with(sizes: &[usize], ids: &[&str]) -> MatchSession {
    let shared = loadout(ids);
    MatchSession {
        teams: sizes
            .iter()
            .enumerate()
            .map(|(team, &size)| TeamSetup {
                name: format!("Team {}", team + 1),
                units: (0..size)
                    .map(|unit| UnitSlot::new(format!("T{team}U{unit}"), shared.clone()))
                    .collect(),
            })
            .collect(),
        rounds_to_play: 3,
        round_winners: Vec::new(),
    }
}

/// A match with its first round already dispatched.
///
/// # Panics
///
/// Panics if the roster is invalid.
#[must_use]
pub fn started_match(sizes: &[usize], ids: &[&str], config: MatchConfig) -> Match {
    let mut game = Match::new(session_with(sizes, ids), AbilityCatalog::standard(), config)
        .expect("valid roster");
    game.start_round().expect("round starts");
    game
}

/// One unit against one, fixed order, actor 1 to move first.
#[must_use]
pub fn duel(ids: &[&str]) -> Match {
    started_match(&[1, 1], ids, test_config())
}

/// A bare registry with `sizes[t]` full-health actors on team `t`.
///
/// Actor ids are assigned team by team in roster order.
#[must_use]
pub fn roster(sizes: &[usize]) -> ActorRegistry {
    let mut actors = ActorRegistry::new();
    for (team, &size) in sizes.iter().enumerate() {
        let team = TeamId::try_from(team).expect("team fits");
        for unit in 0..size {
            actors.insert(Actor::new(
                format!("T{team}U{unit}"),
                team,
                Actor::DEFAULT_MAX_HEALTH,
            ));
        }
    }
    actors
}

/// A roster with a fixed-order orchestrator already on its first turn.
#[must_use]
pub fn started_turns(sizes: &[usize]) -> (ActorRegistry, TurnOrchestrator) {
    let mut actors = roster(sizes);
    let mut turns = TurnOrchestrator::new(OrchestratorConfig::fixed_order());
    turns.build_turn_order(&actors);
    turns
        .start_turns(&mut actors)
        .expect("non-empty roster");
    (actors, turns)
}

/// Collects every event a [`TurnOrchestrator`] emits, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<TurnEvent>>>,
}

impl RecordingListener {
    /// Every kind listeners can subscribe to.
    pub const ALL_KINDS: [EventKind; 7] = [
        EventKind::TurnStarted,
        EventKind::TurnEnded,
        EventKind::PhaseChanged,
        EventKind::TeamWon,
        EventKind::DamageApplied,
        EventKind::ActorDied,
        EventKind::Follow,
    ];

    /// Subscribe a fresh recorder to every kind.
    #[must_use]
    pub fn attach(turns: &mut TurnOrchestrator) -> Self {
        let recorder = Self::default();
        for kind in Self::ALL_KINDS {
            let sink = Arc::clone(&recorder.events);
            turns.subscribe(kind, move |event| {
                sink.lock().expect("recorder lock").push(event.clone());
            });
        }
        recorder
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TurnEvent> {
        self.events.lock().expect("recorder lock").clone()
    }

    /// Recorded events matching a predicate.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&TurnEvent) -> bool) -> usize {
        self.events
            .lock()
            .expect("recorder lock")
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

/// Stand-in ability that counts its resolves.
///
/// Optionally hits the target, optionally holds the turn open.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAbility {
    /// Damage dealt to the target on resolve.
    pub damage: u32,
    /// Whether the turn stays open after resolve.
    pub holds: bool,
    /// Resolve counter, shared between clones.
    pub resolves: Arc<AtomicUsize>,
}

impl ScriptedAbility {
    /// An ability that does nothing but count.
    #[must_use]
    pub fn counting() -> Self {
        Self::default()
    }

    /// An ability that hits its target.
    #[must_use]
    pub fn hitting(damage: u32) -> Self {
        Self {
            damage,
            ..Self::default()
        }
    }

    /// Times `resolve` ran, shared between clones.
    #[must_use]
    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

impl Action for ScriptedAbility {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn resolve(&self, actor: ActorId, ctx: &mut ActionContext<'_>) {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if let (Some(target), true) = (ctx.target, self.damage > 0) {
            ctx.world
                .apply_damage(ctx.turns, target, self.damage, Some(actor), self.name());
        }
    }

    fn holds_turn_open(&self, _actor: ActorId) -> bool {
        self.holds
    }
}
