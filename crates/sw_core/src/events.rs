//! Turn notifications and the listener registry.
//!
//! Listeners are plain callbacks dispatched in subscription order. They
//! observe; they never get mutable access to turn state. Every emitted
//! event is also appended to a pending log that the match loop drains
//! to drive per-actor controllers.

use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, TeamId};
use crate::follow::FollowHandle;
use crate::phase::Phase;

/// Events emitted by the turn core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    /// An actor's turn began.
    TurnStarted(ActorId),
    /// An actor's turn ended.
    TurnEnded(ActorId),
    /// The active phase changed.
    PhaseChanged(Phase),
    /// Exactly one team has living actors.
    TeamWon(TeamId),
    /// Damage landed on an actor.
    DamageApplied {
        /// Attacker, if any.
        source: Option<ActorId>,
        /// Damaged actor.
        target: ActorId,
        /// Hit points removed.
        amount: u32,
        /// Ability name.
        label: String,
    },
    /// An actor's health reached zero.
    ActorDied {
        /// The dead actor.
        actor: ActorId,
        /// Credited killer, if any.
        killer: Option<ActorId>,
        /// Ability name credited with the kill.
        label: String,
    },
    /// An external follow claimed the turn.
    FollowStarted(FollowHandle),
    /// An external follow released the turn.
    FollowEnded(FollowHandle),
}

impl TurnEvent {
    /// Kind used for listener routing.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::TurnStarted(_) => EventKind::TurnStarted,
            Self::TurnEnded(_) => EventKind::TurnEnded,
            Self::PhaseChanged(_) => EventKind::PhaseChanged,
            Self::TeamWon(_) => EventKind::TeamWon,
            Self::DamageApplied { .. } => EventKind::DamageApplied,
            Self::ActorDied { .. } => EventKind::ActorDied,
            Self::FollowStarted(_) | Self::FollowEnded(_) => EventKind::Follow,
        }
    }
}

/// Event categories listeners subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// [`TurnEvent::TurnStarted`].
    TurnStarted,
    /// [`TurnEvent::TurnEnded`].
    TurnEnded,
    /// [`TurnEvent::PhaseChanged`].
    PhaseChanged,
    /// [`TurnEvent::TeamWon`].
    TeamWon,
    /// [`TurnEvent::DamageApplied`].
    DamageApplied,
    /// [`TurnEvent::ActorDied`].
    ActorDied,
    /// Follow start/end.
    Follow,
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&TurnEvent) + Send>;

/// Ordered listener registry with a pending event log.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, EventKind, Listener)>,
    next_listener: u64,
    pending: Vec<TurnEvent>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&TurnEvent) + Send + 'static,
    {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, kind, Box::new(listener)));
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Dispatch an event to matching listeners and log it.
    pub fn emit(&mut self, event: TurnEvent) {
        let kind = event.kind();
        for (_, listener_kind, listener) in &mut self.listeners {
            if *listener_kind == kind {
                listener(&event);
            }
        }
        self.pending.push(event);
    }

    /// Take all events emitted since the last drain.
    pub fn drain(&mut self) -> Vec<TurnEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Events emitted since the last drain.
    #[must_use]
    pub fn pending(&self) -> &[TurnEvent] {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatch_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.subscribe(EventKind::TurnStarted, move |_| {
                log.lock().unwrap().push(tag);
            });
        }

        bus.emit(TurnEvent::TurnStarted(1));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_listeners_only_see_their_kind() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = Arc::clone(&count);
        bus.subscribe(EventKind::TeamWon, move |_| *c.lock().unwrap() += 1);

        bus.emit(TurnEvent::TurnStarted(1));
        bus.emit(TurnEvent::PhaseChanged(Phase::Movement));
        bus.emit(TurnEvent::TeamWon(0));
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let c = Arc::clone(&count);
        let id = bus.subscribe(EventKind::TurnEnded, move |_| *c.lock().unwrap() += 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(TurnEvent::TurnEnded(1));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_drain_empties_pending_log() {
        let mut bus = EventBus::new();
        bus.emit(TurnEvent::TurnStarted(1));
        bus.emit(TurnEvent::TurnEnded(1));
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.pending().is_empty());
    }
}
