//! The action contract and the data-driven ability catalog.
//!
//! Every ability implements [`Action`]. The legality gate runs before any
//! effect, so an illegal call never leaves partial state behind.
//! [`AbilityDef`] is the catalog's implementation: its [`AbilityEffect`]
//! variant is fixed when the catalog is authored, not discovered at call
//! time.
//!
//! # Example RON
//!
//! ```ron
//! AbilityCatalog(
//!     abilities: [
//!         AbilityDef(id: "punch", name: "Punch", effect: Strike(damage: 12)),
//!         AbilityDef(
//!             id: "grenade",
//!             name: "Grenade",
//!             effect: Thrown(damage: 20, flight_ticks: 60),
//!             charge: Some(ChargeProfile(min: 8.0, max: 18.0, speed: 1.5)),
//!         ),
//!         AbilityDef(
//!             id: "jetpack",
//!             name: "Jetpack",
//!             effect: Channel(fuel_ticks: 60),
//!             holds_turn_open: true,
//!         ),
//!     ],
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ActorRegistry};
use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, lerp, ping_pong, Fixed, TICK_RATE};
use crate::orchestrator::TurnOrchestrator;
use crate::phase::Phase;
use crate::world::World;

/// Everything an ability may touch while it resolves.
#[derive(Debug)]
pub struct ActionContext<'a> {
    /// Actors and turn-holding collaborators.
    pub world: &'a mut World,
    /// Turn state. Abilities only read it or route deaths through it.
    pub turns: &'a mut TurnOrchestrator,
    /// Chosen target, if the ability needs one.
    pub target: Option<ActorId>,
    /// Charge value at release, for press-and-hold abilities.
    pub charge: Option<Fixed>,
}

/// Whether `actor` may act right now.
#[must_use]
pub fn can_act(actor: ActorId, actors: &ActorRegistry, turns: &TurnOrchestrator) -> bool {
    actors.get(actor).is_some_and(|a| a.is_turn_active())
        && turns.active_actor() == Some(actor)
        && turns.phase() == Phase::Action
}

/// The contract every ability satisfies.
pub trait Action {
    /// Name credited in damage and kill events.
    fn name(&self) -> &str;

    /// True only for the turn-active actor during its own `Action` phase.
    fn is_legal(&self, actor: ActorId, ctx: &ActionContext<'_>) -> bool {
        can_act(actor, &ctx.world.actors, ctx.turns)
    }

    /// Perform the effect. Callers go through [`Action::try_resolve`].
    fn resolve(&self, actor: ActorId, ctx: &mut ActionContext<'_>);

    /// Whether the effect outlives `resolve` and reports its own end.
    fn holds_turn_open(&self, _actor: ActorId) -> bool {
        false
    }

    /// Press-and-hold ramp, for abilities that charge.
    fn charge_profile(&self) -> Option<ChargeProfile> {
        None
    }

    /// Resolve if legal. Returns whether the effect ran.
    fn try_resolve(&self, actor: ActorId, ctx: &mut ActionContext<'_>) -> bool {
        if !self.is_legal(actor, ctx) {
            tracing::trace!(actor, ability = self.name(), "Illegal action ignored");
            return false;
        }
        tracing::info!(actor, ability = self.name(), "Action resolved");
        ctx.turns.begin_resolution();
        self.resolve(actor, ctx);
        ctx.turns.end_resolution(&mut ctx.world.actors);
        true
    }
}

/// Oscillating charge ramp.
///
/// The value climbs from `min` to `max` and back again while the input
/// is held. Releasing at the peak is part of the skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeProfile {
    /// Value at the bottom of the ramp.
    #[serde(with = "fixed_decimal")]
    pub min: Fixed,
    /// Value at the top of the ramp.
    #[serde(with = "fixed_decimal")]
    pub max: Fixed,
    /// Ramp traversals per second.
    #[serde(with = "fixed_decimal")]
    pub speed: Fixed,
}

impl ChargeProfile {
    /// Charge value after holding for `elapsed_ticks`.
    #[must_use]
    pub fn value_at(&self, elapsed_ticks: u32) -> Fixed {
        let seconds = Fixed::from_num(elapsed_ticks) / Fixed::from_num(TICK_RATE);
        let t = ping_pong(seconds * self.speed, Fixed::ONE);
        lerp(self.min, self.max, t)
    }
}

/// What an ability does when it resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityEffect {
    /// Instant hit on the target.
    Strike {
        /// Damage dealt.
        damage: u32,
    },
    /// Projectile that lands after a flight, claiming a follow meanwhile.
    Thrown {
        /// Damage dealt on landing.
        damage: u32,
        /// Flight time.
        flight_ticks: u32,
    },
    /// Sustained effect burning fuel until empty or cancelled.
    Channel {
        /// Fuel, in ticks.
        fuel_ticks: u32,
    },
    /// Damages every other living actor, then kills the user.
    SelfDestruct {
        /// Damage dealt to each other actor.
        damage: u32,
    },
    /// Restores every living teammate to full health.
    HealTeam,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDef {
    /// Key used in loadouts.
    pub id: String,
    /// Display name, credited in events.
    pub name: String,
    /// Effect.
    pub effect: AbilityEffect,
    /// Charge ramp for press-and-hold input.
    #[serde(default)]
    pub charge: Option<ChargeProfile>,
    /// Whether the effect reports its own conclusion.
    #[serde(default)]
    pub holds_turn_open: bool,
}

impl AbilityDef {
    /// Entry without charge that does not hold the turn.
    #[must_use]
    pub fn new(id: &str, name: &str, effect: AbilityEffect) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            effect,
            charge: None,
            holds_turn_open: false,
        }
    }

    /// Add a charge ramp.
    #[must_use]
    pub fn with_charge(mut self, min: f64, max: f64, speed: f64) -> Self {
        self.charge = Some(ChargeProfile {
            min: Fixed::from_num(min),
            max: Fixed::from_num(max),
            speed: Fixed::from_num(speed),
        });
        self
    }

    /// Mark the effect as holding the turn open.
    #[must_use]
    pub fn holding(mut self) -> Self {
        self.holds_turn_open = true;
        self
    }

    fn launch_force(&self, charge: Option<Fixed>) -> Fixed {
        charge
            .or_else(|| self.charge.map(|c| c.max))
            .unwrap_or(Fixed::ONE)
    }
}

impl Action for AbilityDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, actor: ActorId, ctx: &mut ActionContext<'_>) {
        match self.effect {
            AbilityEffect::Strike { damage } => match ctx.target.filter(|t| *t != actor) {
                Some(target) => {
                    ctx.world
                        .apply_damage(ctx.turns, target, damage, Some(actor), &self.name);
                }
                None => tracing::debug!(actor, ability = %self.name, "Hit nothing"),
            },
            AbilityEffect::Thrown {
                damage,
                flight_ticks,
            } => {
                let force = self.launch_force(ctx.charge);
                ctx.world.launch_projectile(
                    ctx.turns,
                    actor,
                    ctx.target,
                    damage,
                    &self.name,
                    force,
                    flight_ticks,
                );
            }
            AbilityEffect::Channel { fuel_ticks } => {
                ctx.world.channels.begin(actor, fuel_ticks);
            }
            AbilityEffect::SelfDestruct { damage } => {
                let victims: Vec<ActorId> = ctx
                    .world
                    .actors
                    .living()
                    .into_iter()
                    .filter(|id| *id != actor)
                    .collect();
                for victim in victims {
                    ctx.world
                        .apply_damage(ctx.turns, victim, damage, Some(actor), &self.name);
                }
                // User last, so its identity is still valid for the credits above.
                let remaining = ctx.world.actors.get(actor).map_or(0, |a| a.health().current);
                ctx.world
                    .apply_damage(ctx.turns, actor, remaining, None, &self.name);
            }
            AbilityEffect::HealTeam => {
                let Some(team) = ctx.world.actors.get(actor).map(|a| a.team()) else {
                    return;
                };
                for mate in ctx.world.actors.living_teammates(team) {
                    if let Some(unit) = ctx.world.actors.get_mut(mate) {
                        let missing = unit.health().missing();
                        let restored = unit.heal(missing);
                        if restored > 0 {
                            tracing::debug!(actor = mate, restored, "Healed");
                        }
                    }
                }
            }
        }
    }

    fn holds_turn_open(&self, _actor: ActorId) -> bool {
        self.holds_turn_open
    }

    fn charge_profile(&self) -> Option<ChargeProfile> {
        self.charge
    }
}

/// All abilities available for loadouts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityCatalog {
    /// Entries in authoring order.
    pub abilities: Vec<AbilityDef>,
}

impl AbilityCatalog {
    /// The shipped ability set.
    #[must_use]
    pub fn standard() -> Self {
        use AbilityEffect::{Channel, HealTeam, SelfDestruct, Strike, Thrown};

        Self {
            abilities: vec![
                AbilityDef::new("punch", "Punch", Strike { damage: 12 }),
                AbilityDef::new("gun", "Gun", Strike { damage: 8 }),
                AbilityDef::new(
                    "grenade",
                    "Grenade",
                    Thrown {
                        damage: 20,
                        flight_ticks: 60,
                    },
                )
                .with_charge(8.0, 18.0, 1.5),
                AbilityDef::new(
                    "dynamite",
                    "Dynamite",
                    Thrown {
                        damage: 20,
                        flight_ticks: 60,
                    },
                )
                .with_charge(8.0, 18.0, 1.5),
                AbilityDef::new(
                    "boomerang",
                    "Boomerang",
                    Thrown {
                        damage: 10,
                        flight_ticks: 40,
                    },
                ),
                AbilityDef::new(
                    "tshirt_cannon",
                    "T-Shirt Cannon",
                    Thrown {
                        damage: 3,
                        flight_ticks: 10,
                    },
                ),
                AbilityDef::new("jetpack", "Jetpack", Channel { fuel_ticks: 60 }).holding(),
                AbilityDef::new("explode", "Explode", SelfDestruct { damage: 80 }),
                AbilityDef::new("heal_team", "Heal Team", HealTeam),
            ],
        }
    }

    /// Parse a catalog from RON text.
    pub fn from_ron_str(source: &str, origin: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::parse(origin, e))
    }

    /// Look up an ability.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AbilityDef> {
        self.abilities.iter().find(|a| a.id == id)
    }

    /// Look up an ability that must exist.
    pub fn require(&self, id: &str) -> Result<&AbilityDef> {
        self.get(id)
            .ok_or_else(|| GameError::UnknownAbility(id.to_string()))
    }

    /// Whether the catalog has an entry.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::follow::{FollowConfig, FollowStatus};
    use crate::orchestrator::OrchestratorConfig;

    fn in_action(sizes: &[usize]) -> (World, TurnOrchestrator, ActorId) {
        let mut actors = ActorRegistry::new();
        for (team, &size) in sizes.iter().enumerate() {
            for i in 0..size {
                actors.insert(Actor::new(format!("T{team}U{i}"), team as u8, 100));
            }
        }
        let mut world = World::new(actors, FollowConfig::default());
        let mut turns = TurnOrchestrator::new(OrchestratorConfig::fixed_order());
        turns.build_turn_order(&world.actors);
        turns.start_turns(&mut world.actors).unwrap();
        turns.end_movement_phase();
        let active = turns.active_actor().unwrap();
        (world, turns, active)
    }

    fn ctx<'a>(
        world: &'a mut World,
        turns: &'a mut TurnOrchestrator,
        target: Option<ActorId>,
    ) -> ActionContext<'a> {
        ActionContext {
            world,
            turns,
            target,
            charge: None,
        }
    }

    #[test]
    fn test_illegal_outside_action_phase() {
        let mut actors = ActorRegistry::new();
        actors.insert(Actor::new("A", 0, 100));
        actors.insert(Actor::new("B", 1, 100));
        let mut world = World::new(actors, FollowConfig::default());
        let mut turns = TurnOrchestrator::new(OrchestratorConfig::fixed_order());
        turns.build_turn_order(&world.actors);
        turns.start_turns(&mut world.actors).unwrap();

        let punch = AbilityCatalog::standard().require("punch").unwrap().clone();
        let mut c = ctx(&mut world, &mut turns, Some(2));
        assert!(!punch.try_resolve(1, &mut c));
        assert_eq!(world.actors.get(2).unwrap().health().current, 100);
    }

    #[test]
    fn test_illegal_for_inactive_actor() {
        let (mut world, mut turns, active) = in_action(&[1, 1]);
        let other = if active == 1 { 2 } else { 1 };
        let punch = AbilityCatalog::standard().require("punch").unwrap().clone();

        let mut c = ctx(&mut world, &mut turns, Some(active));
        assert!(!punch.try_resolve(other, &mut c));
        assert_eq!(world.actors.get(active).unwrap().health().current, 100);
    }

    #[test]
    fn test_strike_damages_target() {
        let (mut world, mut turns, active) = in_action(&[1, 1]);
        let punch = AbilityCatalog::standard().require("punch").unwrap().clone();
        let mut c = ctx(&mut world, &mut turns, Some(2));
        assert!(punch.try_resolve(active, &mut c));
        assert_eq!(world.actors.get(2).unwrap().health().current, 88);
    }

    #[test]
    fn test_strike_without_target_whiffs() {
        let (mut world, mut turns, active) = in_action(&[1, 1]);
        let gun = AbilityCatalog::standard().require("gun").unwrap().clone();
        let mut c = ctx(&mut world, &mut turns, None);
        assert!(gun.try_resolve(active, &mut c));
        assert_eq!(world.actors.get(2).unwrap().health().current, 100);
    }

    #[test]
    fn test_thrown_claims_follow() {
        let (mut world, mut turns, active) = in_action(&[1, 1]);
        let grenade = AbilityCatalog::standard().require("grenade").unwrap().clone();
        let mut c = ctx(&mut world, &mut turns, Some(2));
        assert!(grenade.try_resolve(active, &mut c));
        assert!(world.follow.is_follow_active());
        assert_eq!(world.projectiles().len(), 1);
        assert_eq!(world.projectiles()[0].force, Fixed::from_num(18));
    }

    #[test]
    fn test_channel_starts_and_holds() {
        let (mut world, mut turns, active) = in_action(&[1, 1]);
        let jetpack = AbilityCatalog::standard().require("jetpack").unwrap().clone();
        assert!(jetpack.holds_turn_open(active));
        let mut c = ctx(&mut world, &mut turns, None);
        assert!(jetpack.try_resolve(active, &mut c));
        assert!(world.channels.is_channelling(active));
    }

    #[test]
    fn test_self_destruct_credits_user_then_dies() {
        let (mut world, mut turns, active) = in_action(&[2, 2]);
        turns.drain_events();
        let explode = AbilityCatalog::standard().require("explode").unwrap().clone();
        let mut c = ctx(&mut world, &mut turns, None);
        assert!(explode.try_resolve(active, &mut c));

        assert!(!world.actors.is_alive(active));
        for id in [3, 4] {
            let victim = world.actors.get(id).unwrap();
            assert_eq!(victim.health().current, 20);
            assert_eq!(victim.last_attacker().unwrap().attacker, active);
        }
        assert_ne!(turns.active_actor(), Some(active));
    }

    #[test]
    fn test_heal_team_restores_teammates_only() {
        let (mut world, mut turns, active) = in_action(&[2, 1]);
        world.actors.get_mut(2).unwrap().apply_damage(40, None, None);
        world.actors.get_mut(3).unwrap().apply_damage(40, None, None);

        let heal = AbilityCatalog::standard().require("heal_team").unwrap().clone();
        let mut c = ctx(&mut world, &mut turns, None);
        assert!(heal.try_resolve(active, &mut c));
        assert_eq!(world.actors.get(2).unwrap().health().current, 100);
        assert_eq!(world.actors.get(3).unwrap().health().current, 60);
    }

    #[test]
    fn test_charge_ramp_ping_pongs() {
        let profile = ChargeProfile {
            min: Fixed::from_num(8),
            max: Fixed::from_num(18),
            speed: Fixed::ONE,
        };
        assert_eq!(profile.value_at(0), Fixed::from_num(8));
        assert_eq!(profile.value_at(TICK_RATE / 2), Fixed::from_num(13));
        assert_eq!(profile.value_at(TICK_RATE), Fixed::from_num(18));
        assert_eq!(profile.value_at(TICK_RATE * 2), Fixed::from_num(8));
    }

    #[test]
    fn test_catalog_from_ron() {
        let source = r#"(
            abilities: [
                (id: "punch", name: "Punch", effect: Strike(damage: 12)),
                (
                    id: "jetpack",
                    name: "Jetpack",
                    effect: Channel(fuel_ticks: 60),
                    holds_turn_open: true,
                ),
                (
                    id: "grenade",
                    name: "Grenade",
                    effect: Thrown(damage: 20, flight_ticks: 60),
                    charge: Some((min: 8.0, max: 18.0, speed: 1.5)),
                ),
            ],
        )"#;
        let catalog = AbilityCatalog::from_ron_str(source, "inline").unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.require("jetpack").unwrap().holds_turn_open);
        assert_eq!(
            catalog.require("grenade").unwrap().charge.unwrap().speed,
            Fixed::from_num(1.5)
        );
        assert!(matches!(
            catalog.require("laser"),
            Err(GameError::UnknownAbility(_))
        ));
    }

    #[test]
    fn test_bad_ron_reports_origin() {
        let err = AbilityCatalog::from_ron_str("(abilities: [", "abilities.ron").unwrap_err();
        assert!(err.to_string().contains("abilities.ron"));
    }

    #[test]
    fn test_standard_catalog_has_nine_abilities() {
        assert_eq!(AbilityCatalog::standard().len(), 9);
    }
}
