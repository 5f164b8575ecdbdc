//! Error types for match setup and data loading.
//!
//! Stale or out-of-order turn calls are not errors: the orchestrator
//! ignores them and reports the outcome through its return values.
//! Only setup and data operations produce a [`GameError`].

use thiserror::Error;

use crate::actor::ActorId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for the turn orchestration core.
#[derive(Debug, Error)]
pub enum GameError {
    /// Turns were started with no actors in any team queue.
    #[error("Cannot start turns: the roster is empty")]
    EmptyRoster,

    /// Invalid actor identifier.
    #[error("Actor not found: {0}")]
    UnknownActor(ActorId),

    /// Ability id not present in the catalog.
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    /// Loadout slot index out of range.
    #[error("Invalid ability slot: {0}")]
    InvalidSlot(usize),

    /// Roster does not describe a playable match.
    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Build a [`GameError::DataParseError`] from any displayable error.
    pub fn parse(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::DataParseError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
