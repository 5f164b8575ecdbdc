//! Scenario loading and configuration.
//!
//! A scenario names a roster, the ability catalog it draws from and the
//! runtime configuration for automated matches.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sw_core::ability::AbilityCatalog;
use sw_core::error::GameError;
use sw_core::game::MatchConfig;
use sw_core::session::{MatchSession, TeamSetup, UnitSlot};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Catalog or roster rejected by the core.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Teams, loadouts and rounds.
    pub session: MatchSession,
    /// Catalog file, relative to the scenario file. The standard
    /// catalog is used when absent.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Runtime configuration.
    #[serde(default)]
    pub config: MatchConfig,
    /// Turns per round before it is abandoned as a draw.
    #[serde(default = "default_max_turns")]
    pub max_turns: u64,
}

const fn default_max_turns() -> u64 {
    500
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Skirmish".to_string(),
            description: "Two teams of four with punch, gun and grenade".to_string(),
            session: MatchSession::default_setup(),
            catalog: None,
            config: MatchConfig::default(),
            max_turns: default_max_turns(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut scenario: Scenario = ron::from_str(&contents)?;

        // Catalog paths are written relative to the scenario.
        if let (Some(catalog), Some(dir)) = (scenario.catalog.as_mut(), path.parent()) {
            if catalog.is_relative() {
                *catalog = dir.join(&*catalog);
            }
        }
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Resolve a built-in scenario name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "duel" => Ok(Self::duel()),
            "skirmish" => Ok(Self::default()),
            "free_for_all" => Ok(Self::free_for_all()),
            path => Self::load(path),
        }
    }

    /// One unit each, every standard projectile in the loadout.
    #[must_use]
    pub fn duel() -> Self {
        let loadout = [
            Some("punch".to_string()),
            Some("grenade".to_string()),
            Some("boomerang".to_string()),
        ];
        let team = |name: &str, unit: &str| TeamSetup {
            name: name.to_string(),
            units: vec![UnitSlot::new(unit, loadout.clone())],
        };
        Self {
            name: "Duel".to_string(),
            description: "One stick against one".to_string(),
            session: MatchSession {
                teams: vec![team("Red", "Red Stick"), team("Blue", "Blue Stick")],
                rounds_to_play: 3,
                round_winners: Vec::new(),
            },
            catalog: None,
            config: MatchConfig::default(),
            max_turns: 200,
        }
    }

    /// Four teams of two with mixed loadouts.
    #[must_use]
    pub fn free_for_all() -> Self {
        let loadouts = [
            ["gun", "dynamite", "heal_team"],
            ["punch", "tshirt_cannon", "jetpack"],
        ];
        let teams = (0..4)
            .map(|team| TeamSetup {
                name: format!("Team {}", team + 1),
                units: loadouts
                    .iter()
                    .enumerate()
                    .map(|(unit, ids)| {
                        UnitSlot::new(
                            format!("Unit {}", unit + 1),
                            ids.map(|id| Some(id.to_string())),
                        )
                    })
                    .collect(),
            })
            .collect();
        Self {
            name: "Free For All".to_string(),
            description: "Four teams of two".to_string(),
            session: MatchSession {
                teams,
                rounds_to_play: 5,
                round_winners: Vec::new(),
            },
            catalog: None,
            config: MatchConfig::default(),
            max_turns: 800,
        }
    }

    /// The catalog this scenario plays with.
    pub fn load_catalog(&self) -> Result<AbilityCatalog, ScenarioError> {
        let Some(path) = &self.catalog else {
            return Ok(AbilityCatalog::standard());
        };
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(AbilityCatalog::from_ron_str(
            &contents,
            &path.display().to_string(),
        )?)
    }

    /// Check the roster against the catalog.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let catalog = self.load_catalog()?;
        self.session.validate(&catalog)?;
        Ok(())
    }
}
