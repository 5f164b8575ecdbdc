//! Shared combat state acted on by abilities.
//!
//! [`World`] bundles the actor registry with the collaborators that can
//! hold a turn open (follows, channels, projectiles in flight). Every
//! hit goes through [`World::apply_damage`] so death always reaches the
//! orchestrator the same way.

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ActorRegistry, DamageReport, DamageSource};
use crate::channel::ChannelTracker;
use crate::events::TurnEvent;
use crate::follow::{FollowConfig, FollowHandle, FollowSubject, FollowTracker};
use crate::math::{fixed_serde, Fixed};
use crate::orchestrator::TurnOrchestrator;

/// Label credited when a kill volume claims an actor nobody hit.
pub const KILL_BOX_LABEL: &str = "KillBox";

/// Identifier for a projectile in flight.
pub type ProjectileId = u64;

/// A thrown object waiting to land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projectile {
    /// Unique identifier.
    pub id: ProjectileId,
    /// Thrower.
    pub owner: ActorId,
    /// Actor hit on landing, if any.
    pub target: Option<ActorId>,
    /// Damage dealt on landing.
    pub damage: u32,
    /// Ability name credited with the hit.
    pub label: String,
    /// Launch force from the charge ramp.
    #[serde(with = "fixed_serde")]
    pub force: Fixed,
    /// Tick at which it lands.
    pub land_tick: u64,
    /// Follow claimed while it flies.
    pub follow: FollowHandle,
}

/// Everything abilities read and mutate besides the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    /// All actors.
    pub actors: ActorRegistry,
    /// Follow claims.
    pub follow: FollowTracker,
    /// Running channels.
    pub channels: ChannelTracker,
    /// Follow tuning.
    pub follow_config: FollowConfig,
    projectiles: Vec<Projectile>,
    next_projectile: ProjectileId,
    tick: u64,
}

impl World {
    /// Wrap an existing registry.
    #[must_use]
    pub fn new(actors: ActorRegistry, follow_config: FollowConfig) -> Self {
        Self {
            actors,
            follow_config,
            ..Self::default()
        }
    }

    /// Ticks elapsed.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Projectiles still in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Apply damage and route any resulting death to the orchestrator.
    ///
    /// `source` is the attacking actor; self-hits and team hits are
    /// applied but never recorded as provenance.
    pub fn apply_damage(
        &mut self,
        turns: &mut TurnOrchestrator,
        target: ActorId,
        amount: u32,
        source: Option<ActorId>,
        label: &str,
    ) -> DamageReport {
        let damage_source = source.and_then(|id| {
            self.actors.get(id).map(|a| DamageSource {
                actor: id,
                team: a.team(),
            })
        });
        self.deal_damage(turns, target, amount, damage_source, source, label)
    }

    /// Kill an actor that left the playable area.
    ///
    /// The kill is credited to whoever last hit it, even if that actor
    /// is gone, or to the kill volume itself when nobody did.
    pub fn kill_out_of_bounds(
        &mut self,
        turns: &mut TurnOrchestrator,
        actor: ActorId,
    ) -> DamageReport {
        let Some(victim) = self.actors.get(actor) else {
            return DamageReport::default();
        };
        if !victim.is_alive() {
            return DamageReport::default();
        }
        let amount = victim.health().current;
        let (credit, label) = match victim.last_attacker() {
            Some(p) => (Some(p.attacker), p.label.clone()),
            None => (None, KILL_BOX_LABEL.to_string()),
        };
        self.deal_damage(turns, actor, amount, None, credit, &label)
    }

    fn deal_damage(
        &mut self,
        turns: &mut TurnOrchestrator,
        target: ActorId,
        amount: u32,
        provenance: Option<DamageSource>,
        credit: Option<ActorId>,
        label: &str,
    ) -> DamageReport {
        let Some(actor) = self.actors.get_mut(target) else {
            tracing::trace!(target, "Damage to unknown actor ignored");
            return DamageReport::default();
        };
        let report = actor.apply_damage(amount, provenance, Some(label));
        if report.applied == 0 {
            return report;
        }

        tracing::debug!(target, source = ?credit, amount = report.applied, label, "Damage applied");
        turns.emit(TurnEvent::DamageApplied {
            source: credit,
            target,
            amount: report.applied,
            label: label.to_string(),
        });

        if report.killed {
            let killer = credit.filter(|s| *s != target);
            tracing::info!(actor = target, killer = ?killer, label, "Actor died");
            turns.emit(TurnEvent::ActorDied {
                actor: target,
                killer,
                label: label.to_string(),
            });
            if report.ended_turn {
                turns.emit(TurnEvent::TurnEnded(target));
            }
            turns.on_actor_died(target, &mut self.actors, &self.follow);
            turns.remove_actor(target);
        }
        report
    }

    /// Launch a projectile and claim a follow for its flight.
    pub fn launch_projectile(
        &mut self,
        turns: &mut TurnOrchestrator,
        owner: ActorId,
        target: Option<ActorId>,
        damage: u32,
        label: &str,
        force: Fixed,
        flight_ticks: u32,
    ) -> ProjectileId {
        self.next_projectile += 1;
        let id = self.next_projectile;
        let follow = self.follow.begin_follow(FollowSubject::Projectile(id));
        turns.emit(TurnEvent::FollowStarted(follow));

        self.projectiles.push(Projectile {
            id,
            owner,
            target,
            damage,
            label: label.to_string(),
            force,
            land_tick: self.tick + u64::from(flight_ticks.max(1)),
            follow,
        });
        tracing::debug!(projectile = id, owner, %follow, flight_ticks, "Projectile launched");
        id
    }

    /// Advance one tick: release follows, land projectiles, burn channels.
    pub fn tick(&mut self, turns: &mut TurnOrchestrator) {
        self.tick += 1;
        let now = self.tick;

        for handle in self.follow.tick() {
            turns.emit(TurnEvent::FollowEnded(handle));
        }

        let (landed, flying): (Vec<_>, Vec<_>) = std::mem::take(&mut self.projectiles)
            .into_iter()
            .partition(|p| p.land_tick <= now);
        self.projectiles = flying;

        for projectile in landed {
            tracing::debug!(projectile = projectile.id, "Projectile landed");
            if let Some(target) = projectile.target {
                self.apply_damage(
                    turns,
                    target,
                    projectile.damage,
                    Some(projectile.owner),
                    &projectile.label,
                );
            }
            let delay = self.follow_config.return_delay_ticks;
            if delay == 0 {
                if self.follow.end_follow(projectile.follow) {
                    turns.emit(TurnEvent::FollowEnded(projectile.follow));
                }
            } else {
                self.follow.end_follow_after(projectile.follow, delay);
            }
        }

        self.channels.tick(turns, &mut self.actors, &self.follow);
    }

    /// Drop in-flight work that belongs to a finished round.
    pub fn clear_transient(&mut self) {
        self.projectiles.clear();
        self.channels.clear();
        if let Some(handle) = self.follow.current_handle() {
            self.follow.end_follow(handle);
        }
    }
}
