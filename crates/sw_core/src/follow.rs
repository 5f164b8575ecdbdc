//! External-follow synchronization.
//!
//! Collaborators that need the turn to stay open while they finish a
//! visual (a camera chasing a thrown object) take a [`FollowHandle`].
//! The orchestrator only sees [`FollowStatus::is_follow_active`] and
//! refuses to end a living actor's turn while it returns `true`.
//!
//! Handles increase monotonically. A newer follow supersedes the old
//! one, so ending or timing out a stale handle is always a no-op.

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;

/// Opaque token for one follow claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FollowHandle(pub u32);

impl std::fmt::Display for FollowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "follow#{}", self.0)
    }
}

/// What is being followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FollowSubject {
    /// An actor (e.g. a unit flung by an explosion).
    Actor(ActorId),
    /// A projectile in flight.
    Projectile(u64),
}

/// Backpressure signal consulted before a turn may end.
pub trait FollowStatus {
    /// Whether any issued follow has not been released yet.
    fn is_follow_active(&self) -> bool;
}

/// A [`FollowStatus`] that never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFollow;

impl FollowStatus for NoFollow {
    fn is_follow_active(&self) -> bool {
        false
    }
}

/// Tuning for follow releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowConfig {
    /// Ticks between a projectile landing and the follow releasing.
    pub return_delay_ticks: u32,
}

impl Default for FollowConfig {
    fn default() -> Self {
        // One second at 20 Hz
        Self {
            return_delay_ticks: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ActiveFollow {
    handle: FollowHandle,
    subject: FollowSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ScheduledRelease {
    handle: FollowHandle,
    due_tick: u64,
}

/// Issues follow handles and runs their delayed releases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowTracker {
    last_handle: u32,
    current: Option<ActiveFollow>,
    scheduled: Vec<ScheduledRelease>,
    tick: u64,
}

impl FollowTracker {
    /// Create a tracker with no follow active.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the turn for a new follow, superseding any current one.
    pub fn begin_follow(&mut self, subject: FollowSubject) -> FollowHandle {
        self.last_handle += 1;
        let handle = FollowHandle(self.last_handle);
        self.current = Some(ActiveFollow { handle, subject });
        tracing::debug!(%handle, ?subject, "Follow started");
        handle
    }

    /// Release a follow immediately. Stale handles are ignored.
    pub fn end_follow(&mut self, handle: FollowHandle) -> bool {
        let Some(current) = self.current.filter(|c| c.handle == handle) else {
            return false;
        };
        self.current = None;
        self.scheduled.retain(|s| s.handle != handle);
        tracing::debug!(%handle, subject = ?current.subject, "Follow ended");
        true
    }

    /// Release a follow after `delay_ticks`. Stale handles are ignored.
    ///
    /// The follow stays active until the release fires. Scheduling again
    /// for the same handle replaces the earlier release.
    pub fn end_follow_after(&mut self, handle: FollowHandle, delay_ticks: u32) -> bool {
        if self.current_handle() != Some(handle) {
            return false;
        }
        if delay_ticks == 0 {
            return self.end_follow(handle);
        }
        self.scheduled.retain(|s| s.handle != handle);
        self.scheduled.push(ScheduledRelease {
            handle,
            due_tick: self.tick + u64::from(delay_ticks),
        });
        true
    }

    /// Advance one tick and fire due releases. Returns released handles.
    pub fn tick(&mut self) -> Vec<FollowHandle> {
        self.tick += 1;
        let now = self.tick;

        let (due, waiting): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|s| s.due_tick <= now);
        self.scheduled = waiting;

        due.into_iter()
            .filter(|s| self.end_follow(s.handle))
            .map(|s| s.handle)
            .collect()
    }

    /// Handle of the follow currently holding the turn.
    #[must_use]
    pub fn current_handle(&self) -> Option<FollowHandle> {
        self.current.map(|c| c.handle)
    }
}

impl FollowStatus for FollowTracker {
    fn is_follow_active(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_monotonic() {
        let mut tracker = FollowTracker::new();
        let a = tracker.begin_follow(FollowSubject::Projectile(1));
        let b = tracker.begin_follow(FollowSubject::Projectile(2));
        assert!(b > a);
        assert_eq!(tracker.current_handle(), Some(b));
    }

    #[test]
    fn test_end_follow_releases() {
        let mut tracker = FollowTracker::new();
        let h = tracker.begin_follow(FollowSubject::Actor(3));
        assert!(tracker.is_follow_active());
        assert!(tracker.end_follow(h));
        assert!(!tracker.is_follow_active());
        assert!(!tracker.end_follow(h));
    }

    #[test]
    fn test_stale_end_is_noop() {
        let mut tracker = FollowTracker::new();
        let old = tracker.begin_follow(FollowSubject::Projectile(1));
        let new = tracker.begin_follow(FollowSubject::Projectile(2));

        assert!(!tracker.end_follow(old));
        assert!(tracker.is_follow_active());
        assert_eq!(tracker.current_handle(), Some(new));
    }

    #[test]
    fn test_delayed_release_fires_after_delay() {
        let mut tracker = FollowTracker::new();
        let h = tracker.begin_follow(FollowSubject::Projectile(1));
        assert!(tracker.end_follow_after(h, 3));

        assert!(tracker.tick().is_empty());
        assert!(tracker.tick().is_empty());
        assert!(tracker.is_follow_active());
        assert_eq!(tracker.tick(), vec![h]);
        assert!(!tracker.is_follow_active());
    }

    #[test]
    fn test_superseded_release_does_not_fire() {
        let mut tracker = FollowTracker::new();
        let old = tracker.begin_follow(FollowSubject::Projectile(1));
        tracker.end_follow_after(old, 2);

        let new = tracker.begin_follow(FollowSubject::Projectile(2));
        tracker.tick();
        tracker.tick();
        tracker.tick();

        assert!(tracker.is_follow_active());
        assert_eq!(tracker.current_handle(), Some(new));
    }

    #[test]
    fn test_rescheduling_replaces_release() {
        let mut tracker = FollowTracker::new();
        let h = tracker.begin_follow(FollowSubject::Projectile(1));
        tracker.end_follow_after(h, 1);
        tracker.end_follow_after(h, 3);

        assert!(tracker.tick().is_empty());
        assert!(tracker.tick().is_empty());
        assert_eq!(tracker.tick(), vec![h]);
    }

    #[test]
    fn test_zero_delay_releases_immediately() {
        let mut tracker = FollowTracker::new();
        let h = tracker.begin_follow(FollowSubject::Projectile(1));
        assert!(tracker.end_follow_after(h, 0));
        assert!(!tracker.is_follow_active());
    }
}
