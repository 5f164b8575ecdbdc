//! Input scripts.
//!
//! A script is a list of [`TurnInput`]s applied to a [`Match`] in order,
//! the way a player's key presses would be. Targets and victims are
//! given as indices into the current living set so that any script is
//! valid against any roster.

use serde::{Deserialize, Serialize};
use sw_core::actor::TeamId;
use sw_core::controller::{ConfirmOutcome, SelectionState, LOADOUT_SLOTS};
use sw_core::game::Match;
use sw_core::phase::Phase;

/// One player or environment input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnInput {
    /// Advance this many ticks.
    Tick(u32),
    /// Turn-start transition finished.
    TransitionComplete,
    /// Leave movement.
    EndMovement,
    /// Request the end of the turn.
    EndTurn,
    /// Choose an ability slot.
    Select(usize),
    /// Press confirm aimed at the n-th living enemy.
    Press(usize),
    /// Release confirm aimed at the n-th living enemy.
    Release(usize),
    /// Cancel a running channel.
    CancelChannel,
    /// Damage the n-th living actor from nowhere.
    Damage {
        /// Index into living actors.
        victim: usize,
        /// Hit points.
        amount: u32,
    },
    /// Push the n-th living actor out of the arena.
    OutOfBounds(usize),
}

fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()])
    }
}

/// Apply one input.
pub fn apply(game: &mut Match, input: &TurnInput) {
    tracing::trace!(?input, "Scripted input");
    match *input {
        TurnInput::Tick(n) => {
            for _ in 0..n {
                game.tick();
            }
        }
        TurnInput::TransitionComplete => {
            game.transition_complete();
        }
        TurnInput::EndMovement => {
            game.end_movement();
        }
        TurnInput::EndTurn => {
            game.end_turn();
        }
        TurnInput::Select(slot) => {
            game.select_slot(slot);
        }
        TurnInput::Press(target) => {
            let target = pick(&game.enemies_of_active(), target);
            game.press_confirm(target);
        }
        TurnInput::Release(target) => {
            let target = pick(&game.enemies_of_active(), target);
            game.release_confirm(target);
        }
        TurnInput::CancelChannel => {
            game.cancel_channel();
        }
        TurnInput::Damage { victim, amount } => {
            if let Some(id) = pick(&game.actors().living(), victim) {
                game.apply_damage(id, amount, None, "Script");
            }
        }
        TurnInput::OutOfBounds(victim) => {
            if let Some(id) = pick(&game.actors().living(), victim) {
                game.kill_out_of_bounds(id);
            }
        }
    }
}

/// Apply every input in order.
pub fn run(game: &mut Match, script: &[TurnInput]) {
    for input in script {
        apply(game, input);
    }
}

/// Parse a script written as a RON list.
pub fn parse(source: &str) -> Result<Vec<TurnInput>, ron::error::SpannedError> {
    ron::from_str(source)
}

/// Take one sensible step for the active actor.
///
/// Uses the first filled slot on the first living enemy. Returns `false`
/// once the round is over or stuck idle.
pub fn autoplay_step(game: &mut Match) -> bool {
    match game.phase() {
        Phase::Idle => return false,
        Phase::Starting | Phase::NextUnit => {
            game.transition_complete();
        }
        Phase::Movement => {
            game.end_movement();
        }
        Phase::TurnEnd => game.tick(),
        Phase::Action => autoplay_action(game),
    }
    true
}

fn autoplay_action(game: &mut Match) {
    let Some(controller) = game.active_actor().and_then(|id| game.controller(id)) else {
        game.end_turn();
        return;
    };
    let state = controller.state();
    let used = controller.action_used();
    let first_slot = (0..LOADOUT_SLOTS).find(|i| controller.slot(*i).is_some());
    let target = game.enemies_of_active().first().copied();

    match state {
        SelectionState::Charging { .. } => {
            game.release_confirm(target);
        }
        SelectionState::Resolving(_) => game.tick(),
        _ if used => game.tick(),
        SelectionState::Selected(_) => {
            if game.press_confirm(target) == ConfirmOutcome::Ignored {
                game.end_turn();
            }
        }
        SelectionState::Idle => {
            let Some(slot) = first_slot else {
                game.end_turn();
                return;
            };
            game.select_slot(slot);
            match game.press_confirm(target) {
                ConfirmOutcome::Charging => {
                    game.tick();
                    game.release_confirm(target);
                }
                ConfirmOutcome::Ignored => {
                    game.end_turn();
                }
                ConfirmOutcome::Resolved { .. } => {}
            }
        }
    }
}

/// Autoplay until the round is won or `max_steps` is reached.
pub fn autoplay_round(game: &mut Match, max_steps: usize) -> Option<TeamId> {
    for _ in 0..max_steps {
        if game.winner().is_some() || !autoplay_step(game) {
            break;
        }
    }
    game.winner()
}
