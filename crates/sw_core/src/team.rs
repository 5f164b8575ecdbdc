//! Per-team round-robin queues and turn-order shuffling.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::actor::{ActorId, TeamId};

/// One team's round-robin turn order.
///
/// `cursor` is the index of the member whose turn most recently started
/// from this queue, or `None` before the first dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamQueue {
    team: TeamId,
    members: Vec<ActorId>,
    cursor: Option<usize>,
}

impl TeamQueue {
    /// Create a queue with the cursor before the first member.
    #[must_use]
    pub fn new(team: TeamId, members: Vec<ActorId>) -> Self {
        Self {
            team,
            members,
            cursor: None,
        }
    }

    /// Team this queue belongs to.
    #[must_use]
    pub const fn team(&self) -> TeamId {
        self.team
    }

    /// Members in turn order.
    #[must_use]
    pub fn members(&self) -> &[ActorId] {
        &self.members
    }

    /// Index of the most recently dispatched member.
    #[must_use]
    pub const fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether the queue has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Find the next living member after the cursor and move the cursor
    /// onto it.
    ///
    /// Makes at most one full pass. When nobody is alive the cursor is
    /// left untouched and `None` is returned: the team is eliminated.
    pub fn next_living<F>(&mut self, is_alive: F) -> Option<ActorId>
    where
        F: Fn(ActorId) -> bool,
    {
        let len = self.members.len();
        if len == 0 {
            return None;
        }
        let start = self.cursor.map_or(0, |c| c + 1);
        for step in 0..len {
            let index = (start + step) % len;
            let candidate = self.members[index];
            if is_alive(candidate) {
                self.cursor = Some(index);
                return Some(candidate);
            }
        }
        None
    }

    /// Drop a member, keeping the cursor on the same logical position.
    pub fn remove(&mut self, id: ActorId) -> bool {
        let Some(pos) = self.members.iter().position(|m| *m == id) else {
            return false;
        };
        self.members.remove(pos);
        if let Some(c) = self.cursor {
            if pos <= c {
                self.cursor = c.checked_sub(1);
            }
        }
        true
    }
}

/// Source of turn-order permutations.
///
/// Injected into the orchestrator so tests can pin the order.
pub trait TurnShuffler: Send {
    /// Permute the order in which teams alternate.
    fn shuffle_teams(&mut self, teams: &mut [TeamId]);

    /// Permute one team's internal order.
    fn shuffle_members(&mut self, members: &mut [ActorId]);
}

/// Leaves every order as given (teams ascending, members by ID).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityShuffler;

impl TurnShuffler for IdentityShuffler {
    fn shuffle_teams(&mut self, _teams: &mut [TeamId]) {}

    fn shuffle_members(&mut self, _members: &mut [ActorId]) {}
}

/// Unbiased Fisher-Yates shuffles from a seeded PRNG.
#[derive(Debug, Clone)]
pub struct SeededShuffler {
    rng: SmallRng,
}

impl SeededShuffler {
    /// Create a shuffler with a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl TurnShuffler for SeededShuffler {
    fn shuffle_teams(&mut self, teams: &mut [TeamId]) {
        teams.shuffle(&mut self.rng);
    }

    fn shuffle_members(&mut self, members: &mut [ActorId]) {
        members.shuffle(&mut self.rng);
    }
}
