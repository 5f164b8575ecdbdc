//! Match roster and round bookkeeping.
//!
//! A [`MatchSession`] is owned by whoever runs the match and passed to
//! the runtime explicitly. It survives across rounds: unit names and
//! loadouts persist, live actor ids are refreshed on every spawn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ability::AbilityCatalog;
use crate::actor::{Actor, ActorId, ActorRegistry, TeamId};
use crate::controller::LOADOUT_SLOTS;
use crate::error::{GameError, Result};
use crate::math::{Fixed, Vec3Fixed};

/// Ability ids in slot order.
pub type Loadout = [Option<String>; LOADOUT_SLOTS];

/// One unit's persistent setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSlot {
    /// Display name.
    pub name: String,
    /// Ability ids.
    #[serde(default)]
    pub loadout: Loadout,
    /// Maximum health at spawn.
    #[serde(default = "default_max_health")]
    pub max_health: u32,
    /// Live actor for the current round; `None` once it died.
    #[serde(skip)]
    pub live: Option<ActorId>,
}

const fn default_max_health() -> u32 {
    Actor::DEFAULT_MAX_HEALTH
}

impl UnitSlot {
    /// A unit with the given loadout and default health.
    #[must_use]
    pub fn new(name: impl Into<String>, loadout: Loadout) -> Self {
        Self {
            name: name.into(),
            loadout,
            max_health: Actor::DEFAULT_MAX_HEALTH,
            live: None,
        }
    }
}

/// One team's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Display name.
    pub name: String,
    /// Units in roster order.
    pub units: Vec<UnitSlot>,
}

/// Roster and round results for a whole match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSession {
    /// Teams; a team's id is its index.
    pub teams: Vec<TeamSetup>,
    /// Rounds in the match.
    #[serde(default = "default_rounds")]
    pub rounds_to_play: u32,
    /// Winner of each completed round.
    #[serde(default)]
    pub round_winners: Vec<TeamId>,
}

const fn default_rounds() -> u32 {
    3
}

impl Default for MatchSession {
    fn default() -> Self {
        Self::default_setup()
    }
}

impl MatchSession {
    /// Units per team in the default setup.
    pub const DEFAULT_UNITS_PER_TEAM: usize = 4;

    /// Two teams of four units with punch, gun and grenade.
    #[must_use]
    pub fn default_setup() -> Self {
        let loadout: Loadout = [
            Some("punch".to_string()),
            Some("gun".to_string()),
            Some("grenade".to_string()),
        ];
        let teams = (0..2)
            .map(|team| TeamSetup {
                name: format!("Team {}", team + 1),
                units: (0..Self::DEFAULT_UNITS_PER_TEAM)
                    .map(|i| UnitSlot::new(format!("Unit {}", i + 1), loadout.clone()))
                    .collect(),
            })
            .collect();

        Self {
            teams,
            rounds_to_play: default_rounds(),
            round_winners: Vec::new(),
        }
    }

    /// Parse a session from RON text.
    pub fn from_ron_str(source: &str, origin: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::parse(origin, e))
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(e.to_string()))
    }

    /// Check the roster is playable and every loadout id exists.
    pub fn validate(&self, catalog: &AbilityCatalog) -> Result<()> {
        if self.teams.len() < 2 {
            return Err(GameError::InvalidRoster(format!(
                "need at least 2 teams, found {}",
                self.teams.len()
            )));
        }
        if self.teams.len() > usize::from(TeamId::MAX) + 1 {
            return Err(GameError::InvalidRoster(format!(
                "too many teams: {}",
                self.teams.len()
            )));
        }
        if self.rounds_to_play == 0 {
            return Err(GameError::InvalidRoster("rounds_to_play is 0".into()));
        }
        for team in &self.teams {
            if team.units.is_empty() {
                return Err(GameError::InvalidRoster(format!(
                    "team '{}' has no units",
                    team.name
                )));
            }
            for unit in &team.units {
                for id in unit.loadout.iter().flatten() {
                    catalog.require(id)?;
                }
            }
        }
        Ok(())
    }

    fn unit_mut(&mut self, team: usize, unit: usize) -> Result<&mut UnitSlot> {
        self.teams
            .get_mut(team)
            .and_then(|t| t.units.get_mut(unit))
            .ok_or_else(|| GameError::InvalidRoster(format!("no unit {unit} in team {team}")))
    }

    /// Put an ability (or nothing) in one unit's slot.
    pub fn set_loadout(
        &mut self,
        team: usize,
        unit: usize,
        slot: usize,
        ability: Option<&str>,
        catalog: &AbilityCatalog,
    ) -> Result<()> {
        if slot >= LOADOUT_SLOTS {
            return Err(GameError::InvalidSlot(slot));
        }
        if let Some(id) = ability {
            catalog.require(id)?;
        }
        let target = self.unit_mut(team, unit)?;
        target.loadout[slot] = ability.map(str::to_string);
        Ok(())
    }

    /// Create one living actor per unit and record the live ids.
    ///
    /// Teams are lined up facing each other along the x axis.
    pub fn spawn_round(&mut self, actors: &mut ActorRegistry) -> Vec<ActorId> {
        let mut spawned = Vec::new();
        for (team_index, team) in self.teams.iter_mut().enumerate() {
            let team_id = TeamId::try_from(team_index).unwrap_or(TeamId::MAX);
            let x = Fixed::from_num(team_index as i32 * 20);
            for (unit_index, unit) in team.units.iter_mut().enumerate() {
                let mut actor = Actor::new(unit.name.clone(), team_id, unit.max_health);
                actor.position =
                    Vec3Fixed::new(x, Fixed::ZERO, Fixed::from_num(unit_index as i32 * 3));
                let id = actors.insert(actor);
                unit.live = Some(id);
                spawned.push(id);
            }
        }
        tracing::info!(
            round = self.round_winners.len() + 1,
            actors = spawned.len(),
            "Round spawned"
        );
        spawned
    }

    /// Forget live ids of actors that died or were removed.
    pub fn clear_dead(&mut self, actors: &ActorRegistry) {
        for unit in self.teams.iter_mut().flat_map(|t| t.units.iter_mut()) {
            if unit.live.is_some_and(|id| !actors.is_alive(id)) {
                unit.live = None;
            }
        }
    }

    /// Loadout of the unit spawned as `actor`.
    #[must_use]
    pub fn loadout_of(&self, actor: ActorId) -> Option<&Loadout> {
        self.teams
            .iter()
            .flat_map(|t| t.units.iter())
            .find(|u| u.live == Some(actor))
            .map(|u| &u.loadout)
    }

    /// Record a round result.
    pub fn record_round(&mut self, winner: TeamId) -> Result<()> {
        if self.is_complete() {
            return Err(GameError::InvalidState("all rounds already played".into()));
        }
        if usize::from(winner) >= self.teams.len() {
            return Err(GameError::InvalidState(format!("unknown team {winner}")));
        }
        self.round_winners.push(winner);
        tracing::info!(
            winner,
            round = self.round_winners.len(),
            of = self.rounds_to_play,
            "Round recorded"
        );
        Ok(())
    }

    /// Round wins per team.
    #[must_use]
    pub fn wins(&self) -> BTreeMap<TeamId, u32> {
        let mut wins = BTreeMap::new();
        for winner in &self.round_winners {
            *wins.entry(*winner).or_insert(0) += 1;
        }
        wins
    }

    /// Whether every round has been played or a team holds a majority.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.round_winners.len() >= self.rounds_to_play as usize || self.match_winner().is_some()
    }

    /// The team holding a strict majority of `rounds_to_play`.
    #[must_use]
    pub fn match_winner(&self) -> Option<TeamId> {
        self.wins()
            .into_iter()
            .find(|(_, wins)| *wins * 2 > self.rounds_to_play)
            .map(|(team, _)| team)
    }
}
