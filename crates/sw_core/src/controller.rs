//! Per-actor input handling for ability slots.
//!
//! ```text
//! Idle --select--> Selected --confirm--> Resolving --> Idle
//!                     |  ^                  ^
//!                     |  +--select same--   |
//!                     +--press (charge)--> Charging --release--+
//! ```
//!
//! One ability may be confirmed per turn. The controller forgets its
//! selection and charge on any phase change and fully resets when its
//! own actor's turn starts or ends.

use serde::{Deserialize, Serialize};

use crate::ability::{can_act, AbilityCatalog, AbilityDef, Action, ActionContext};
use crate::actor::{ActorId, ActorRegistry};
use crate::error::{GameError, Result};
use crate::events::TurnEvent;
use crate::math::Fixed;
use crate::orchestrator::TurnOrchestrator;

/// Ability slots per actor.
pub const LOADOUT_SLOTS: usize = 3;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SelectionState {
    /// Nothing chosen.
    #[default]
    Idle,
    /// A slot is chosen and waits for confirm.
    Selected(usize),
    /// Confirm is held on a charging ability.
    Charging {
        /// Chosen slot.
        slot: usize,
        /// Ticks held so far.
        elapsed_ticks: u32,
    },
    /// A holding ability is running.
    Resolving(usize),
}

/// Result of a confirm input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Nothing happened.
    Ignored,
    /// The charge ramp started.
    Charging,
    /// The ability resolved.
    Resolved {
        /// The ability reports its own conclusion later.
        holds_turn_open: bool,
    },
}

/// Binds one actor's input to its ability slots.
#[derive(Debug, Clone)]
pub struct ActionSelectionController<A: Action = AbilityDef> {
    actor: ActorId,
    slots: [Option<A>; LOADOUT_SLOTS],
    state: SelectionState,
    action_used: bool,
}

impl ActionSelectionController<AbilityDef> {
    /// Build from ability ids, resolving each against the catalog.
    pub fn from_loadout(
        actor: ActorId,
        loadout: &[Option<String>; LOADOUT_SLOTS],
        catalog: &AbilityCatalog,
    ) -> Result<Self> {
        let mut slots: [Option<AbilityDef>; LOADOUT_SLOTS] = Default::default();
        for (slot, id) in slots.iter_mut().zip(loadout) {
            if let Some(id) = id {
                *slot = Some(catalog.require(id)?.clone());
            }
        }
        Ok(Self::new(actor, slots))
    }
}

impl<A: Action> ActionSelectionController<A> {
    /// Create a controller with the given slots.
    pub fn new(actor: ActorId, slots: [Option<A>; LOADOUT_SLOTS]) -> Self {
        Self {
            actor,
            slots,
            state: SelectionState::Idle,
            action_used: false,
        }
    }

    /// Actor this controller drives.
    pub const fn actor(&self) -> ActorId {
        self.actor
    }

    /// Current state.
    pub const fn state(&self) -> SelectionState {
        self.state
    }

    /// Whether this turn's action has been confirmed.
    pub const fn action_used(&self) -> bool {
        self.action_used
    }

    /// Ability in a slot.
    pub fn slot(&self, index: usize) -> Option<&A> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Chosen slot in any non-idle state.
    pub const fn selected_slot(&self) -> Option<usize> {
        match self.state {
            SelectionState::Idle => None,
            SelectionState::Selected(slot)
            | SelectionState::Charging { slot, .. }
            | SelectionState::Resolving(slot) => Some(slot),
        }
    }

    /// Replace a slot's ability. Clears the selection if it pointed there.
    pub fn set_slot(&mut self, index: usize, ability: Option<A>) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(GameError::InvalidSlot(index))?;
        *slot = ability;
        if matches!(self.state, SelectionState::Selected(s) if s == index) {
            self.state = SelectionState::Idle;
        }
        Ok(())
    }

    /// Current charge value while confirm is held.
    pub fn current_charge(&self) -> Option<Fixed> {
        let SelectionState::Charging {
            slot,
            elapsed_ticks,
        } = self.state
        else {
            return None;
        };
        self.slot(slot)
            .and_then(Action::charge_profile)
            .map(|p| p.value_at(elapsed_ticks))
    }

    fn accepts_input(&self, actors: &ActorRegistry, turns: &TurnOrchestrator) -> bool {
        !self.action_used && can_act(self.actor, actors, turns)
    }

    /// Choose a slot. Choosing the selected slot again cancels it.
    pub fn select_slot(
        &mut self,
        index: usize,
        actors: &ActorRegistry,
        turns: &TurnOrchestrator,
    ) -> bool {
        if !self.accepts_input(actors, turns) {
            return false;
        }
        let Some(ability) = self.slot(index) else {
            return false;
        };
        let name = ability.name().to_string();

        match self.state {
            SelectionState::Selected(current) if current == index => {
                tracing::debug!(actor = self.actor, ability = %name, "Selection cancelled");
                self.state = SelectionState::Idle;
            }
            SelectionState::Idle | SelectionState::Selected(_) => {
                tracing::debug!(actor = self.actor, ability = %name, slot = index, "Ability selected");
                self.state = SelectionState::Selected(index);
            }
            SelectionState::Charging { .. } | SelectionState::Resolving(_) => return false,
        }
        true
    }

    /// Confirm pressed. Charging abilities start their ramp; others resolve.
    pub fn press_confirm(&mut self, ctx: &mut ActionContext<'_>) -> ConfirmOutcome {
        let SelectionState::Selected(slot) = self.state else {
            return ConfirmOutcome::Ignored;
        };
        if !self.accepts_input(&ctx.world.actors, ctx.turns) {
            return ConfirmOutcome::Ignored;
        }
        let charges = self
            .slot(slot)
            .is_some_and(|a| a.charge_profile().is_some());
        if charges {
            self.state = SelectionState::Charging {
                slot,
                elapsed_ticks: 0,
            };
            return ConfirmOutcome::Charging;
        }
        self.resolve_slot(slot, ctx, None)
    }

    /// Confirm released. Resolves a charging ability at the current value.
    pub fn release_confirm(&mut self, ctx: &mut ActionContext<'_>) -> ConfirmOutcome {
        let SelectionState::Charging { slot, .. } = self.state else {
            return ConfirmOutcome::Ignored;
        };
        if !self.accepts_input(&ctx.world.actors, ctx.turns) {
            self.state = SelectionState::Idle;
            return ConfirmOutcome::Ignored;
        }
        let charge = self.current_charge();
        self.resolve_slot(slot, ctx, charge)
    }

    /// Advance the charge ramp one tick.
    pub fn tick(&mut self, actors: &ActorRegistry, turns: &TurnOrchestrator) {
        let SelectionState::Charging {
            slot,
            elapsed_ticks,
        } = self.state
        else {
            return;
        };
        if !self.accepts_input(actors, turns) {
            self.state = SelectionState::Idle;
            return;
        }
        self.state = SelectionState::Charging {
            slot,
            elapsed_ticks: elapsed_ticks.saturating_add(1),
        };
    }

    fn resolve_slot(
        &mut self,
        slot: usize,
        ctx: &mut ActionContext<'_>,
        charge: Option<Fixed>,
    ) -> ConfirmOutcome {
        let Some(ability) = self.slots.get(slot).and_then(Option::as_ref) else {
            self.state = SelectionState::Idle;
            return ConfirmOutcome::Ignored;
        };
        if !ability.is_legal(self.actor, ctx) {
            return ConfirmOutcome::Ignored;
        }

        self.state = SelectionState::Resolving(slot);
        self.action_used = true;
        ctx.charge = charge;
        ability.try_resolve(self.actor, ctx);

        let holds = ability.holds_turn_open(self.actor);
        if !holds {
            self.state = SelectionState::Idle;
            let world = &mut *ctx.world;
            ctx.turns
                .notify_action_resolved(self.actor, &mut world.actors, &world.follow);
        }
        ConfirmOutcome::Resolved {
            holds_turn_open: holds,
        }
    }

    /// React to a turn notification.
    pub fn on_event(&mut self, event: &TurnEvent) {
        match *event {
            TurnEvent::TurnStarted(actor) | TurnEvent::TurnEnded(actor) if actor == self.actor => {
                self.reset();
            }
            TurnEvent::PhaseChanged(_) => {
                self.state = SelectionState::Idle;
            }
            _ => {}
        }
    }

    /// Forget selection, charge and the used flag.
    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
        self.action_used = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Actor;
    use crate::follow::{FollowConfig, FollowStatus};
    use crate::orchestrator::OrchestratorConfig;
    use crate::phase::Phase;
    use crate::world::World;

    fn setup() -> (World, TurnOrchestrator, ActionSelectionController) {
        let mut actors = ActorRegistry::new();
        actors.insert(Actor::new("A", 0, 100));
        actors.insert(Actor::new("B", 1, 100));
        let mut world = World::new(actors, FollowConfig::default());
        let mut turns = TurnOrchestrator::new(OrchestratorConfig::fixed_order());
        turns.build_turn_order(&world.actors);
        turns.start_turns(&mut world.actors).unwrap();
        turns.end_movement_phase();

        let loadout = [
            Some("punch".to_string()),
            Some("grenade".to_string()),
            Some("jetpack".to_string()),
        ];
        let controller =
            ActionSelectionController::from_loadout(1, &loadout, &AbilityCatalog::standard())
                .unwrap();
        (world, turns, controller)
    }

    fn ctx<'a>(world: &'a mut World, turns: &'a mut TurnOrchestrator) -> ActionContext<'a> {
        ActionContext {
            world,
            turns,
            target: Some(2),
            charge: None,
        }
    }

    #[test]
    fn test_unknown_ability_in_loadout() {
        let loadout = [Some("laser".to_string()), None, None];
        let result =
            ActionSelectionController::from_loadout(1, &loadout, &AbilityCatalog::standard());
        assert!(matches!(result, Err(GameError::UnknownAbility(_))));
    }

    #[test]
    fn test_toggle_returns_to_idle() {
        let (world, turns, mut controller) = setup();
        assert!(controller.select_slot(0, &world.actors, &turns));
        assert_eq!(controller.state(), SelectionState::Selected(0));
        assert!(controller.select_slot(0, &world.actors, &turns));
        assert_eq!(controller.state(), SelectionState::Idle);
        assert!(!controller.action_used());
    }

    #[test]
    fn test_select_other_replaces() {
        let (world, turns, mut controller) = setup();
        controller.select_slot(0, &world.actors, &turns);
        controller.select_slot(2, &world.actors, &turns);
        assert_eq!(controller.state(), SelectionState::Selected(2));
    }

    #[test]
    fn test_select_outside_action_phase_is_ignored() {
        let mut actors = ActorRegistry::new();
        actors.insert(Actor::new("A", 0, 100));
        actors.insert(Actor::new("B", 1, 100));
        let mut turns = TurnOrchestrator::new(OrchestratorConfig::fixed_order());
        turns.build_turn_order(&actors);
        turns.start_turns(&mut actors).unwrap();

        let loadout = [Some("punch".to_string()), None, None];
        let mut controller =
            ActionSelectionController::from_loadout(1, &loadout, &AbilityCatalog::standard())
                .unwrap();
        assert!(!controller.select_slot(0, &actors, &turns));
        assert_eq!(controller.state(), SelectionState::Idle);
    }

    #[test]
    fn test_empty_slot_is_ignored() {
        let (world, turns, mut controller) = setup();
        controller.set_slot(1, None).unwrap();
        assert!(!controller.select_slot(1, &world.actors, &turns));
        assert!(matches!(
            controller.set_slot(5, None),
            Err(GameError::InvalidSlot(5))
        ));
    }

    #[test]
    fn test_confirm_resolves_and_ends_turn() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(0, &world.actors, &turns);
        let outcome = controller.press_confirm(&mut ctx(&mut world, &mut turns));

        assert_eq!(
            outcome,
            ConfirmOutcome::Resolved {
                holds_turn_open: false
            }
        );
        assert_eq!(world.actors.get(2).unwrap().health().current, 88);
        assert_eq!(turns.active_actor(), Some(2));
        assert!(controller.action_used());
    }

    #[test]
    fn test_one_action_per_turn() {
        let (mut world, _, mut controller) = setup();
        let config = OrchestratorConfig {
            auto_end_turn: false,
            ..OrchestratorConfig::fixed_order()
        };
        let mut turns = TurnOrchestrator::new(config);
        turns.build_turn_order(&world.actors);
        turns.start_turns(&mut world.actors).unwrap();
        turns.end_movement_phase();

        controller.select_slot(0, &world.actors, &turns);
        controller.press_confirm(&mut ctx(&mut world, &mut turns));
        assert_eq!(turns.phase(), Phase::TurnEnd);

        assert!(!controller.select_slot(0, &world.actors, &turns));
        assert_eq!(
            controller.press_confirm(&mut ctx(&mut world, &mut turns)),
            ConfirmOutcome::Ignored
        );
        assert_eq!(world.actors.get(2).unwrap().health().current, 88);
    }

    #[test]
    fn test_charge_then_release() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(1, &world.actors, &turns);
        assert_eq!(
            controller.press_confirm(&mut ctx(&mut world, &mut turns)),
            ConfirmOutcome::Charging
        );
        assert_eq!(controller.current_charge(), Some(Fixed::from_num(8)));

        for _ in 0..4 {
            controller.tick(&world.actors, &turns);
        }
        let expected = controller.current_charge().unwrap();
        assert!(expected > Fixed::from_num(8));

        controller.release_confirm(&mut ctx(&mut world, &mut turns));
        assert_eq!(world.projectiles()[0].force, expected);
        // The flight holds the turn open.
        assert!(world.follow.is_follow_active());
        assert_eq!(turns.active_actor(), Some(1));
        assert_eq!(turns.phase(), Phase::TurnEnd);
    }

    #[test]
    fn test_holding_ability_stays_resolving() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(2, &world.actors, &turns);
        let outcome = controller.press_confirm(&mut ctx(&mut world, &mut turns));

        assert_eq!(
            outcome,
            ConfirmOutcome::Resolved {
                holds_turn_open: true
            }
        );
        assert_eq!(controller.state(), SelectionState::Resolving(2));
        assert_eq!(turns.phase(), Phase::Action);
        assert!(world.channels.is_channelling(1));
    }

    #[test]
    fn test_phase_change_clears_selection() {
        let (world, turns, mut controller) = setup();
        controller.select_slot(0, &world.actors, &turns);
        controller.on_event(&TurnEvent::PhaseChanged(Phase::TurnEnd));
        assert_eq!(controller.state(), SelectionState::Idle);
    }

    #[test]
    fn test_phase_change_drops_charge() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(1, &world.actors, &turns);
        controller.press_confirm(&mut ctx(&mut world, &mut turns));
        controller.tick(&world.actors, &turns);
        assert!(controller.current_charge().is_some());

        controller.on_event(&TurnEvent::PhaseChanged(Phase::TurnEnd));
        assert_eq!(controller.state(), SelectionState::Idle);
        assert_eq!(controller.current_charge(), None);
        assert_eq!(
            controller.release_confirm(&mut ctx(&mut world, &mut turns)),
            ConfirmOutcome::Ignored
        );
        assert!(world.projectiles().is_empty());
    }

    #[test]
    fn test_own_turn_end_drops_charge() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(1, &world.actors, &turns);
        controller.press_confirm(&mut ctx(&mut world, &mut turns));

        controller.on_event(&TurnEvent::TurnEnded(2));
        assert!(matches!(controller.state(), SelectionState::Charging { .. }));

        controller.on_event(&TurnEvent::TurnEnded(1));
        assert_eq!(controller.state(), SelectionState::Idle);
        assert_eq!(controller.current_charge(), None);
        assert!(!controller.action_used());
    }

    #[test]
    fn test_input_ignored_while_resolving() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(2, &world.actors, &turns);
        controller.press_confirm(&mut ctx(&mut world, &mut turns));
        assert_eq!(controller.state(), SelectionState::Resolving(2));

        assert!(!controller.select_slot(0, &world.actors, &turns));
        assert_eq!(
            controller.press_confirm(&mut ctx(&mut world, &mut turns)),
            ConfirmOutcome::Ignored
        );
        assert_eq!(
            controller.release_confirm(&mut ctx(&mut world, &mut turns)),
            ConfirmOutcome::Ignored
        );
        controller.tick(&world.actors, &turns);

        assert_eq!(controller.state(), SelectionState::Resolving(2));
        assert_eq!(world.actors.get(2).unwrap().health().current, 100);
        assert!(world.projectiles().is_empty());
    }

    #[test]
    fn test_own_turn_start_resets_used_flag() {
        let (mut world, mut turns, mut controller) = setup();
        controller.select_slot(0, &world.actors, &turns);
        controller.press_confirm(&mut ctx(&mut world, &mut turns));
        assert!(controller.action_used());

        controller.on_event(&TurnEvent::TurnStarted(2));
        assert!(controller.action_used());
        controller.on_event(&TurnEvent::TurnStarted(1));
        assert!(!controller.action_used());
    }
}
