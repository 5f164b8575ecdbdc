//! # SW Core
//!
//! Deterministic turn orchestration core for Stick Warfare.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness (turn order shuffles are seeded)
//! - No floating-point math in simulation paths (uses fixed-point)
//!
//! This separation enables:
//! - Headless automated matches
//! - Determinism testing
//! - Scripted scenario tests of every turn edge case
//!
//! ## Crate Structure
//!
//! - [`orchestrator`] - Whose turn it is, which phase, who won
//! - [`ability`] - The action contract and the ability catalog
//! - [`controller`] - Per-actor slot selection, charge and confirm
//! - [`follow`] - Follow handles that hold a turn open
//! - [`channel`] - Channelled abilities
//! - [`game`] - The composed match runtime

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ability;
pub mod actor;
pub mod channel;
pub mod controller;
pub mod error;
pub mod events;
pub mod follow;
pub mod game;
pub mod math;
pub mod orchestrator;
pub mod phase;
pub mod session;
pub mod team;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ability::{
        AbilityCatalog, AbilityDef, AbilityEffect, Action, ActionContext, ChargeProfile,
    };
    pub use crate::actor::{Actor, ActorId, ActorRegistry, DamageReport, TeamId};
    pub use crate::channel::{ChannelEnd, ChannelTracker};
    pub use crate::controller::{ActionSelectionController, ConfirmOutcome, SelectionState};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{EventKind, TurnEvent};
    pub use crate::follow::{FollowConfig, FollowHandle, FollowStatus, FollowSubject, FollowTracker};
    pub use crate::game::{Match, MatchConfig, MatchSnapshot};
    pub use crate::math::{Fixed, Vec3Fixed, TICK_RATE};
    pub use crate::orchestrator::{
        AdvanceOutcome, EndTurnOutcome, OrchestratorConfig, TurnAnchor, TurnOrchestrator,
    };
    pub use crate::phase::Phase;
    pub use crate::session::{MatchSession, TeamSetup, UnitSlot};
    pub use crate::world::World;
}
