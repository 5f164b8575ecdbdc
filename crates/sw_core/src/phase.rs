//! Turn phases.

use serde::{Deserialize, Serialize};

/// Sub-stage of the active actor's turn.
///
/// Within one turn the phase only moves forward:
/// `Starting | NextUnit -> Movement -> Action -> TurnEnd`. The only way
/// back is the reset to `NextUnit` when the next actor is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Phase {
    /// No turn in progress (before the first turn, or after a win).
    #[default]
    Idle,
    /// First turn of the session, waiting on the intro transition.
    Starting,
    /// Actor is free to move.
    Movement,
    /// Actor may use one ability.
    Action,
    /// Ability resolved; waiting for the turn to be released.
    TurnEnd,
    /// A later turn, waiting on the hand-over transition.
    NextUnit,
}

impl Phase {
    /// Position in the per-turn cycle.
    const fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Starting | Self::NextUnit => 1,
            Self::Movement => 2,
            Self::Action => 3,
            Self::TurnEnd => 4,
        }
    }

    /// Whether `self -> next` keeps phases monotonic.
    ///
    /// Entering `Starting`/`NextUnit` begins a new cycle and is always
    /// allowed, as is the reset to `Idle`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        match next {
            Self::Idle | Self::Starting | Self::NextUnit => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// Whether a turn transition is still playing.
    #[must_use]
    pub const fn is_transition(self) -> bool {
        matches!(self, Self::Starting | Self::NextUnit)
    }

    /// Short name for logs and protocol output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Movement => "movement",
            Self::Action => "action",
            Self::TurnEnd => "turn_end",
            Self::NextUnit => "next_unit",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_cycle_is_allowed() {
        assert!(Phase::Starting.can_advance_to(Phase::Movement));
        assert!(Phase::NextUnit.can_advance_to(Phase::Movement));
        assert!(Phase::Movement.can_advance_to(Phase::Action));
        assert!(Phase::Action.can_advance_to(Phase::TurnEnd));
        assert!(Phase::TurnEnd.can_advance_to(Phase::NextUnit));
    }

    #[test]
    fn test_regression_is_rejected() {
        assert!(!Phase::Action.can_advance_to(Phase::Movement));
        assert!(!Phase::TurnEnd.can_advance_to(Phase::Action));
        assert!(!Phase::Movement.can_advance_to(Phase::Movement));
    }

    #[test]
    fn test_new_cycle_from_any_phase() {
        assert!(Phase::Movement.can_advance_to(Phase::NextUnit));
        assert!(Phase::Action.can_advance_to(Phase::NextUnit));
        assert!(Phase::Idle.can_advance_to(Phase::Starting));
    }
}
