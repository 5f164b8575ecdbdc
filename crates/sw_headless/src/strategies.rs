//! Automated players for headless matches.
//!
//! A strategy looks at the active actor's loadout and the living enemies
//! and decides which slot to use, on whom, and how long to hold a
//! charging ability.

use std::path::Path;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sw_core::ability::{AbilityEffect, Action};
use sw_core::actor::ActorId;
use sw_core::controller::LOADOUT_SLOTS;
use sw_core::game::Match;
use thiserror::Error;

/// Error type for strategy operations.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// File not found.
    #[error("Strategy file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read strategy file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse strategy: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Name not recognised.
    #[error("Unknown strategy: {0}")]
    Unknown(String),
}

/// How an automated player picks its moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Strategy {
    /// Highest-damage ability on the weakest enemy, charged to the peak.
    #[default]
    Aggressive,
    /// Any filled slot on any enemy, released after a random hold.
    Random {
        /// Seed mixed into the game seed.
        seed: u64,
    },
}

/// One turn's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Loadout slot to use.
    pub slot: usize,
    /// Enemy to aim at.
    pub target: Option<ActorId>,
    /// Ticks to hold confirm on a charging ability.
    pub hold_ticks: u32,
}

impl Strategy {
    /// Parse a command-line name: `aggressive`, `random` or `random:<seed>`.
    pub fn parse(name: &str) -> Result<Self, StrategyError> {
        match name.split_once(':') {
            None if name == "aggressive" => Ok(Self::Aggressive),
            None if name == "random" => Ok(Self::Random { seed: 0 }),
            Some(("random", seed)) => seed
                .parse()
                .map(|seed| Self::Random { seed })
                .map_err(|_| StrategyError::Unknown(name.to_string())),
            _ => Err(StrategyError::Unknown(name.to_string())),
        }
    }

    /// Load a strategy from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StrategyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StrategyError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    /// Short name for metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Random { .. } => "random",
        }
    }

    /// Random source for one game.
    #[must_use]
    pub fn rng(&self, game_seed: u64) -> SmallRng {
        let salt = match self {
            Self::Aggressive => 0,
            Self::Random { seed } => *seed,
        };
        SmallRng::seed_from_u64(game_seed ^ salt.rotate_left(17))
    }

    /// Decide the active actor's action, or `None` to pass the turn.
    pub fn decide(&self, game: &Match, rng: &mut SmallRng) -> Option<Decision> {
        let actor = game.active_actor()?;
        let controller = game.controller(actor)?;
        let enemies = game.enemies_of_active();

        let slots: Vec<usize> = (0..LOADOUT_SLOTS)
            .filter(|i| controller.slot(*i).is_some())
            .collect();
        if slots.is_empty() {
            return None;
        }

        match self {
            Self::Aggressive => {
                let slot = *slots
                    .iter()
                    .max_by_key(|i| controller.slot(**i).map_or(0, |a| threat(&a.effect)))?;
                let target = enemies.iter().copied().min_by_key(|id| {
                    game.actors()
                        .get(*id)
                        .map_or(u32::MAX, |a| a.health().current)
                });
                let hold_ticks = controller
                    .slot(slot)
                    .and_then(Action::charge_profile)
                    .map_or(0, |p| peak_ticks(p.speed.to_num::<f64>()));
                Some(Decision {
                    slot,
                    target,
                    hold_ticks,
                })
            }
            Self::Random { .. } => Some(Decision {
                slot: *slots.choose(rng)?,
                target: enemies.choose(rng).copied(),
                hold_ticks: rng.gen_range(0..40),
            }),
        }
    }
}

/// Rough expected damage, used to rank abilities.
fn threat(effect: &AbilityEffect) -> u32 {
    match *effect {
        AbilityEffect::Strike { damage } | AbilityEffect::Thrown { damage, .. } => damage,
        // Killing yourself is a last resort.
        AbilityEffect::SelfDestruct { .. } => 1,
        AbilityEffect::Channel { .. } | AbilityEffect::HealTeam => 0,
    }
}

/// Ticks until the ramp first reaches its peak.
fn peak_ticks(speed: f64) -> u32 {
    if speed <= 0.0 {
        return 0;
    }
    let ticks = f64::from(sw_core::math::TICK_RATE) / speed;
    // Truncation is fine, the ramp is flat near the peak.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        ticks as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_test_utils::fixtures::{started_match, test_config};

    #[test]
    fn test_parse_names() {
        assert_eq!(Strategy::parse("aggressive").unwrap(), Strategy::Aggressive);
        assert_eq!(
            Strategy::parse("random:42").unwrap(),
            Strategy::Random { seed: 42 }
        );
        assert!(Strategy::parse("turtle").is_err());
        assert!(Strategy::parse("random:x").is_err());
    }

    #[test]
    fn test_aggressive_prefers_damage_and_weakest() {
        let mut game = started_match(&[1, 2], &["heal_team", "gun", "grenade"], test_config());
        game.apply_damage(3, 50, None, "Test");

        let mut rng = Strategy::Aggressive.rng(0);
        let decision = Strategy::Aggressive.decide(&game, &mut rng).unwrap();
        assert_eq!(decision.slot, 2);
        assert_eq!(decision.target, Some(3));
        // 1.5 ramps per second at 20 Hz
        assert_eq!(decision.hold_ticks, 13);
    }

    #[test]
    fn test_random_is_seeded() {
        let game = started_match(&[2, 2], &["punch", "gun", "grenade"], test_config());
        let strategy = Strategy::Random { seed: 9 };
        let a: Vec<_> = {
            let mut rng = strategy.rng(5);
            (0..10).map(|_| strategy.decide(&game, &mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = strategy.rng(5);
            (0..10).map(|_| strategy.decide(&game, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_ron_strategy() {
        let strategy: Strategy = ron::from_str("Random(seed: 3)").unwrap();
        assert_eq!(strategy, Strategy::Random { seed: 3 });
    }
}
