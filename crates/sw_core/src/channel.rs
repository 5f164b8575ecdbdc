//! Channelled abilities that hold the action phase open.
//!
//! A channel burns one tick of fuel per update while its actor stays in
//! its own `Action` phase. Running dry or an explicit cancel concludes
//! the action through [`TurnOrchestrator::notify_action_resolved`]. A
//! channel whose actor died or lost the phase is dropped silently: the
//! orchestrator has already moved on.

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, ActorRegistry};
use crate::follow::FollowStatus;
use crate::orchestrator::TurnOrchestrator;

/// A running channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChannel {
    /// Channelling actor.
    pub actor: ActorId,
    /// Fuel left, in ticks.
    pub remaining_ticks: u32,
    /// Fuel at the start.
    pub total_ticks: u32,
}

/// How a channel stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEnd {
    /// Fuel ran out; the action was reported resolved.
    Depleted(ActorId),
    /// Stopped early on request; the action was reported resolved.
    Cancelled(ActorId),
    /// The actor died or left its action phase; nothing was reported.
    Interrupted(ActorId),
}

/// Runs every active channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelTracker {
    channels: Vec<ActiveChannel>,
}

impl ChannelTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a channel. Restarting an actor's channel refuels it.
    pub fn begin(&mut self, actor: ActorId, fuel_ticks: u32) {
        let fuel = fuel_ticks.max(1);
        self.channels.retain(|c| c.actor != actor);
        self.channels.push(ActiveChannel {
            actor,
            remaining_ticks: fuel,
            total_ticks: fuel,
        });
        tracing::debug!(actor, fuel_ticks = fuel, "Channel started");
    }

    /// Whether `actor` is channelling.
    #[must_use]
    pub fn is_channelling(&self, actor: ActorId) -> bool {
        self.channels.iter().any(|c| c.actor == actor)
    }

    /// The actor's running channel.
    #[must_use]
    pub fn get(&self, actor: ActorId) -> Option<&ActiveChannel> {
        self.channels.iter().find(|c| c.actor == actor)
    }

    /// Number of running channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether nothing is channelling.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Burn one tick of fuel on every channel.
    pub fn tick(
        &mut self,
        turns: &mut TurnOrchestrator,
        actors: &mut ActorRegistry,
        follow: &dyn FollowStatus,
    ) -> Vec<ChannelEnd> {
        let mut ended = Vec::new();
        let mut running = Vec::with_capacity(self.channels.len());

        for mut channel in std::mem::take(&mut self.channels) {
            if !actors.is_alive(channel.actor) || !turns.is_action_phase_of(channel.actor) {
                tracing::debug!(actor = channel.actor, "Channel interrupted");
                ended.push(ChannelEnd::Interrupted(channel.actor));
                continue;
            }
            channel.remaining_ticks -= 1;
            if channel.remaining_ticks == 0 {
                ended.push(ChannelEnd::Depleted(channel.actor));
            } else {
                running.push(channel);
            }
        }
        self.channels = running;

        for end in &ended {
            if let ChannelEnd::Depleted(actor) = *end {
                tracing::debug!(actor, "Channel depleted");
                turns.notify_action_resolved(actor, actors, follow);
            }
        }
        ended
    }

    /// Stop a channel early and report the action resolved.
    ///
    /// Returns `None` when the actor was not channelling.
    pub fn cancel(
        &mut self,
        actor: ActorId,
        turns: &mut TurnOrchestrator,
        actors: &mut ActorRegistry,
        follow: &dyn FollowStatus,
    ) -> Option<ChannelEnd> {
        let pos = self.channels.iter().position(|c| c.actor == actor)?;
        self.channels.remove(pos);

        if actors.is_alive(actor) && turns.is_action_phase_of(actor) {
            tracing::debug!(actor, "Channel cancelled");
            turns.notify_action_resolved(actor, actors, follow);
            Some(ChannelEnd::Cancelled(actor))
        } else {
            Some(ChannelEnd::Interrupted(actor))
        }
    }

    /// Drop every channel without notifying.
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}
