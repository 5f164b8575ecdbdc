//! JSON lines protocol for driving a match from another process.
//!
//! One JSON object per line: commands on stdin, responses on stdout,
//! logs on stderr.
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","round":1}
//! -> {"cmd":"position","actor":1,"x":4.0,"y":0.0,"z":-2.5}
//! <- {"type":"ack","cmd":"position"}
//! -> {"cmd":"end_movement"}
//! <- {"type":"event","event":{"PhaseChanged":"Action"}}
//! <- {"type":"ack","cmd":"end_movement"}
//! -> {"cmd":"select","slot":0}
//! <- {"type":"ack","cmd":"select"}
//! -> {"cmd":"press","target":2}
//! <- {"type":"event","event":{"DamageApplied":{...}}}
//! <- {"type":"ack","cmd":"press"}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":0,"round":1,"phase":"action",...}
//! ```
//!
//! Rounds open in `Movement`. A scenario that turns off
//! `auto_begin_movement` waits for `transition_complete` first.

use serde::{Deserialize, Serialize};
use sw_core::actor::{ActorId, TeamId};
use sw_core::events::TurnEvent;
use sw_core::game::Match;

/// Protocol version reported in [`Response::Ready`].
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands accepted by the interactive runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the world by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },
    /// Report the current state without advancing.
    Query,
    /// Finish the pre-movement or next-unit transition.
    TransitionComplete,
    /// Leave movement for action selection.
    EndMovement,
    /// Move an actor, as reported by the movement layer.
    Position {
        actor: ActorId,
        x: f64,
        y: f64,
        z: f64,
    },
    /// Choose a loadout slot.
    Select { slot: usize },
    /// Press confirm, aiming at `target`.
    Press {
        #[serde(default)]
        target: Option<ActorId>,
    },
    /// Release confirm on a charging ability.
    Release {
        #[serde(default)]
        target: Option<ActorId>,
    },
    /// Request the end of the active turn.
    EndTurn,
    /// Stop a running channel early.
    CancelChannel,
    /// Environmental damage, e.g. from a scripted hazard.
    Damage { target: ActorId, amount: u32 },
    /// Kill an actor that left the arena.
    OutOfBounds { actor: ActorId },
    /// Report the state hash.
    Hash,
    /// Record the decided round and start the next one.
    NextRound,
    /// Shut down.
    Quit,
}

const fn default_tick_count() -> u32 {
    1
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Command name for acknowledgments.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::TransitionComplete => "transition_complete",
            Self::EndMovement => "end_movement",
            Self::Position { .. } => "position",
            Self::Select { .. } => "select",
            Self::Press { .. } => "press",
            Self::Release { .. } => "release",
            Self::EndTurn => "end_turn",
            Self::CancelChannel => "cancel_channel",
            Self::Damage { .. } => "damage",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::Hash => "hash",
            Self::NextRound => "next_round",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses written by the interactive runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready { version: String, round: u32 },
    /// Command accepted.
    Ack { cmd: String },
    /// Command rejected or malformed.
    Error {
        message: String,
        cmd: Option<String>,
    },
    /// Full match state.
    State(StateView),
    /// A turn event, in emission order.
    Event { event: TurnEvent },
    /// A round was decided.
    RoundOver { round: u32, winner: String },
    /// Every round has been played.
    MatchOver { winner: Option<String> },
    /// State hash for determinism checks.
    StateHash { tick: u64, hash: u64 },
    /// Goodbye before shutdown.
    Bye,
}

impl Response {
    /// Ready banner.
    #[must_use]
    pub fn ready(round: u32) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            round,
        }
    }

    /// Acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to a JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

// ============================================================================
// State Types
// ============================================================================

/// Snapshot of the match for controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateView {
    pub tick: u64,
    pub round: u32,
    pub turn: u64,
    pub phase: String,
    pub active: Option<ActorId>,
    /// Selection state of the active actor's controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<String>,
    pub winner: Option<TeamId>,
    pub actors: Vec<ActorView>,
    pub hash: u64,
}

/// One actor as seen by a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorView {
    pub id: ActorId,
    pub name: String,
    pub team: TeamId,
    pub health: u32,
    pub max_health: u32,
    pub alive: bool,
    pub turn_active: bool,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Ability ids in slot order.
    pub loadout: Vec<Option<String>>,
}

impl StateView {
    /// Build a view of `game`.
    #[must_use]
    pub fn capture(game: &Match) -> Self {
        let actors = game
            .actors()
            .sorted_ids()
            .into_iter()
            .filter_map(|id| {
                let actor = game.actors().get(id)?;
                let health = actor.health();
                let loadout = game
                    .session()
                    .loadout_of(id)
                    .map(|l| l.to_vec())
                    .unwrap_or_default();
                Some(ActorView {
                    id,
                    name: actor.name.clone(),
                    team: actor.team(),
                    health: health.current,
                    max_health: health.max,
                    alive: actor.is_alive(),
                    turn_active: actor.is_turn_active(),
                    x: actor.position.x.to_num(),
                    y: actor.position.y.to_num(),
                    z: actor.position.z.to_num(),
                    loadout,
                })
            })
            .collect();

        let selection = game
            .active_actor()
            .and_then(|id| game.controller(id))
            .map(|c| format!("{:?}", c.state()));

        Self {
            tick: game.world().tick_count(),
            round: game.round(),
            turn: game.turns().turn_number(),
            phase: game.phase().as_str().to_string(),
            active: game.active_actor(),
            selection,
            winner: game.winner(),
            actors,
            hash: game.state_hash(),
        }
    }
}
