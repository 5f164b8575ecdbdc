//! Combat participants and their storage.
//!
//! An [`Actor`] is pure data plus the few mutators that keep its
//! invariants: `alive == (health > 0)` and `turn_active` implies `alive`.
//! Turn flags are flipped only by the orchestrator through
//! [`Actor::begin_turn`] / [`Actor::end_turn`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec3Fixed};

/// Unique identifier for actors.
pub type ActorId = u64;

/// Team identifier (small non-negative integer).
pub type TeamId = u8;

/// Label used when damage arrives without a named ability.
pub const UNKNOWN_ACTION: &str = "UnknownAction";

/// Health component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points (never above `max`).
    pub current: u32,
    /// Maximum hit points.
    pub max: u32,
}

impl Health {
    /// Full health with the given maximum.
    #[must_use]
    pub const fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Missing hit points.
    #[must_use]
    pub const fn missing(&self) -> u32 {
        self.max - self.current
    }
}

/// Who last hurt an actor, used to credit indirect kills.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// The attacker. May no longer resolve if it was removed.
    pub attacker: ActorId,
    /// Ability name used in the hit.
    pub label: String,
}

/// Source of a damage application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageSource {
    /// Attacking actor.
    pub actor: ActorId,
    /// Attacker's team at the time of the hit.
    pub team: TeamId,
}

/// Result of [`Actor::apply_damage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageReport {
    /// Hit points actually removed.
    pub applied: u32,
    /// The hit reduced health to zero.
    pub killed: bool,
    /// The actor's turn was force-ended by the death.
    pub ended_turn: bool,
}

/// A combat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Unique identifier.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    team: TeamId,
    alive: bool,
    health: Health,
    /// Radius of the movement leash around the turn anchor.
    #[serde(with = "fixed_serde")]
    pub move_range: Fixed,
    /// Last known position, reported by movement collaborators.
    pub position: Vec3Fixed,
    turn_active: bool,
    last_attacker: Option<Provenance>,
}

impl Actor {
    /// Default movement leash radius.
    pub const DEFAULT_MOVE_RANGE: i32 = 6;

    /// Default maximum health.
    pub const DEFAULT_MAX_HEALTH: u32 = 100;

    /// Create a living actor at full health.
    #[must_use]
    pub fn new(name: impl Into<String>, team: TeamId, max_health: u32) -> Self {
        let max = max_health.max(1);
        Self {
            id: 0,
            name: name.into(),
            team,
            alive: true,
            health: Health::full(max),
            move_range: Fixed::from_num(Self::DEFAULT_MOVE_RANGE),
            position: Vec3Fixed::ZERO,
            turn_active: false,
            last_attacker: None,
        }
    }

    /// Team membership.
    #[must_use]
    pub const fn team(&self) -> TeamId {
        self.team
    }

    /// Whether the actor is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }

    /// True only between `begin_turn` and `end_turn`.
    #[must_use]
    pub const fn is_turn_active(&self) -> bool {
        self.turn_active
    }

    /// Last enemy that damaged this actor, if any.
    #[must_use]
    pub fn last_attacker(&self) -> Option<&Provenance> {
        self.last_attacker.as_ref()
    }

    /// Start this actor's turn.
    ///
    /// Clears attacker provenance: once the actor moves under its own
    /// control, a later fall is nobody else's kill.
    pub fn begin_turn(&mut self) {
        if !self.alive {
            return;
        }
        self.last_attacker = None;
        self.turn_active = true;
    }

    /// End this actor's turn. Returns whether it was active.
    pub fn end_turn(&mut self) -> bool {
        if !self.turn_active {
            return false;
        }
        self.turn_active = false;
        true
    }

    /// Apply damage, tracking provenance for enemy hits.
    pub fn apply_damage(
        &mut self,
        amount: u32,
        source: Option<DamageSource>,
        label: Option<&str>,
    ) -> DamageReport {
        if !self.alive || amount == 0 {
            return DamageReport::default();
        }

        if let Some(src) = source {
            if src.actor != self.id && src.team != self.team {
                let label = label
                    .filter(|l| !l.trim().is_empty())
                    .unwrap_or(UNKNOWN_ACTION);
                self.last_attacker = Some(Provenance {
                    attacker: src.actor,
                    label: label.to_string(),
                });
            }
        }

        let applied = amount.min(self.health.current);
        self.health.current -= applied;

        let mut report = DamageReport {
            applied,
            ..DamageReport::default()
        };
        if self.health.current == 0 {
            self.alive = false;
            report.killed = true;
            report.ended_turn = self.end_turn();
        }
        report
    }

    /// Restore health up to the maximum. Returns hit points restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if !self.alive || amount == 0 {
            return 0;
        }
        let restored = amount.min(self.health.missing());
        self.health.current += restored;
        restored
    }

    /// Kill the actor outright, regardless of remaining health.
    pub fn kill(&mut self) -> DamageReport {
        let amount = self.health.current;
        self.apply_damage(amount, None, None)
    }
}

/// Storage for all actors in a match.
///
/// Uses a `HashMap` for O(1) lookup by ID, with deterministic
/// iteration via sorted keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorRegistry {
    actors: HashMap<ActorId, Actor>,
    next_id: ActorId,
}

impl ActorRegistry {
    /// Create empty actor storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actors: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new actor and return its ID.
    pub fn insert(&mut self, mut actor: Actor) -> ActorId {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        actor.id = id;
        self.actors.insert(id, actor);
        id
    }

    /// Remove an actor by ID.
    pub fn remove(&mut self, id: ActorId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    /// Get an actor by ID.
    #[must_use]
    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Get a mutable reference to an actor by ID.
    pub fn get_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Check if an actor exists.
    #[must_use]
    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Whether the actor exists and is alive.
    #[must_use]
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.actors.get(&id).is_some_and(Actor::is_alive)
    }

    /// Get the number of actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Get sorted actor IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<_> = self.actors.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Living actors in ID order.
    #[must_use]
    pub fn living(&self) -> Vec<ActorId> {
        self.sorted_ids()
            .into_iter()
            .filter(|id| self.is_alive(*id))
            .collect()
    }

    /// Living members of a team in ID order.
    #[must_use]
    pub fn living_teammates(&self, team: TeamId) -> Vec<ActorId> {
        self.sorted_ids()
            .into_iter()
            .filter(|id| {
                self.actors
                    .get(id)
                    .is_some_and(|a| a.is_alive() && a.team() == team)
            })
            .collect()
    }

    /// Number of actors currently flagged turn-active.
    #[must_use]
    pub fn turn_active_count(&self) -> usize {
        self.actors.values().filter(|a| a.is_turn_active()).count()
    }

    /// Iterate over all actors (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&ActorId, &Actor)> {
        self.actors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(team_a: usize, team_b: usize) -> (ActorRegistry, Vec<ActorId>) {
        let mut reg = ActorRegistry::new();
        let mut ids = Vec::new();
        for i in 0..team_a {
            ids.push(reg.insert(Actor::new(format!("A{i}"), 0, 100)));
        }
        for i in 0..team_b {
            ids.push(reg.insert(Actor::new(format!("B{i}"), 1, 100)));
        }
        (reg, ids)
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let (reg, ids) = registry_with(2, 1);
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(reg.sorted_ids(), vec![1, 2, 3]);
        assert_eq!(reg.get(2).unwrap().name, "A1");
    }

    #[test]
    fn test_damage_saturates_and_kills() {
        let mut actor = Actor::new("U", 0, 30);
        let report = actor.apply_damage(50, None, None);
        assert_eq!(report.applied, 30);
        assert!(report.killed);
        assert!(!actor.is_alive());
        assert_eq!(actor.health().current, 0);
    }

    #[test]
    fn test_damage_on_dead_actor_is_ignored() {
        let mut actor = Actor::new("U", 0, 10);
        actor.kill();
        let report = actor.apply_damage(5, None, None);
        assert_eq!(report, DamageReport::default());
    }

    #[test]
    fn test_zero_damage_is_ignored() {
        let mut actor = Actor::new("U", 0, 10);
        assert_eq!(actor.apply_damage(0, None, None).applied, 0);
        assert_eq!(actor.health().current, 10);
    }

    #[test]
    fn test_death_ends_active_turn() {
        let mut actor = Actor::new("U", 0, 10);
        actor.begin_turn();
        let report = actor.apply_damage(10, None, None);
        assert!(report.ended_turn);
        assert!(!actor.is_turn_active());
    }

    #[test]
    fn test_provenance_only_for_enemy_hits() {
        let mut actor = Actor::new("U", 0, 100);
        actor.id = 7;

        actor.apply_damage(5, Some(DamageSource { actor: 3, team: 0 }), Some("Punch"));
        assert!(actor.last_attacker().is_none(), "teammate hit must not attribute");

        actor.apply_damage(5, Some(DamageSource { actor: 7, team: 1 }), Some("Punch"));
        assert!(actor.last_attacker().is_none(), "self hit must not attribute");

        actor.apply_damage(5, Some(DamageSource { actor: 4, team: 1 }), Some("  "));
        let prov = actor.last_attacker().unwrap();
        assert_eq!(prov.attacker, 4);
        assert_eq!(prov.label, UNKNOWN_ACTION);
    }

    #[test]
    fn test_begin_turn_clears_provenance() {
        let mut actor = Actor::new("U", 0, 100);
        actor.apply_damage(5, Some(DamageSource { actor: 9, team: 1 }), Some("Gun"));
        assert!(actor.last_attacker().is_some());

        actor.begin_turn();
        assert!(actor.is_turn_active());
        assert!(actor.last_attacker().is_none());
    }

    #[test]
    fn test_begin_turn_on_dead_actor_is_noop() {
        let mut actor = Actor::new("U", 0, 10);
        actor.kill();
        actor.begin_turn();
        assert!(!actor.is_turn_active());
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let mut actor = Actor::new("U", 0, 100);
        actor.apply_damage(30, None, None);
        assert_eq!(actor.heal(50), 30);
        assert_eq!(actor.health().current, 100);
    }

    #[test]
    fn test_living_teammates() {
        let (mut reg, ids) = registry_with(2, 2);
        reg.get_mut(ids[0]).unwrap().kill();
        assert_eq!(reg.living_teammates(0), vec![ids[1]]);
        assert_eq!(reg.living_teammates(1), vec![ids[2], ids[3]]);
        assert_eq!(reg.living().len(), 3);
    }
}
