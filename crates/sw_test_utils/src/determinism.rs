//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a match produces identical
//! results given identical rosters, seeds and inputs.
//!
//! # Testing Strategy
//!
//! Replays, snapshots and headless batch comparisons all assume that a
//! match is a pure function of its setup and inputs. Sources of
//! non-determinism include:
//!
//! - **Floating-point math**: charge ramps and positions use
//!   [`sw_core::math::Fixed`].
//!
//! - **HashMap iteration order**: actors are always visited in sorted ID
//!   order, team queues live in a `BTreeMap`.
//!
//! - **System randomness**: the turn order shuffle is seeded from
//!   [`sw_core::orchestrator::OrchestratorConfig::seed`].
//!
//! # Test Levels
//!
//! 1. **Unit tests**: a single turn cycle hashes identically
//! 2. **Property tests**: random input scripts stay deterministic
//! 3. **Parallel tests**: N matches on N threads all agree

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use sw_core::game::{Match, MatchSnapshot};

use crate::script::{self, TurnInput};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps taken per run.
    pub steps: u64,
}

impl DeterminismResult {
    /// All unique hashes (1 for a deterministic match).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert the runs agreed, with a detailed message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Match is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel match runs.
#[derive(Debug, Clone)]
pub struct ParallelMatchResult {
    /// Final state hash from each match.
    pub hashes: Vec<u64>,
    /// Autoplay steps each match ran.
    pub steps: u64,
    /// Number of matches run.
    pub num_matches: usize,
}

impl ParallelMatchResult {
    /// Whether every match ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all matches agreed.
    ///
    /// # Panics
    ///
    /// Panics if matches produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel matches diverged!\n\
                 Matches: {}\n\
                 Steps: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_matches,
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run any state machine several times and compare final hashes.
///
/// # Example
///
/// ```ignore
/// use sw_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     200, // 200 steps each
///     || duel(&["punch", "grenade"]),
///     |game| { autoplay_step(game); },
///     Match::state_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..steps {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Autoplay two identical matches and compare their final hashes.
pub fn verify_match_determinism<F>(setup_fn: F, steps: u64) -> bool
where
    F: Fn() -> Match,
{
    verify_determinism(
        2,
        steps,
        &setup_fn,
        |game| {
            script::autoplay_step(game);
        },
        Match::state_hash,
    )
    .is_deterministic
}

/// Apply the same script to two identical matches and compare.
pub fn verify_script_determinism<F>(setup_fn: F, script: &[TurnInput]) -> bool
where
    F: Fn() -> Match,
{
    let mut first = setup_fn();
    let mut second = setup_fn();
    script::run(&mut first, script);
    script::run(&mut second, script);
    first.state_hash() == second.state_hash() && first.drain_events() == second.drain_events()
}

/// Autoplay N matches on scoped threads and collect final hashes.
///
/// Each match is built on its own thread so that nothing about it needs
/// to cross thread boundaries.
///
/// # Panics
///
/// Panics if a worker thread panicked.
pub fn run_parallel_matches_scoped<F>(setup_fn: F, num_matches: usize, steps: u64) -> ParallelMatchResult
where
    F: Fn() -> Match + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_matches)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup_fn();
                    for _ in 0..steps {
                        script::autoplay_step(&mut game);
                    }
                    game.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("match thread panicked"))
            .collect()
    });

    ParallelMatchResult {
        hashes,
        steps,
        num_matches,
    }
}

/// Step two identical matches side by side and report the first step
/// after which they differ.
///
/// `None` if they never diverge, `Some(0)` if they differ at setup.
pub fn find_first_divergence<F>(setup_fn: F, steps: u64) -> Option<u64>
where
    F: Fn() -> Match,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for step in 1..=steps {
        script::autoplay_step(&mut first);
        script::autoplay_step(&mut second);

        if first.state_hash() != second.state_hash() {
            return Some(step);
        }
    }

    None
}

/// Verify a snapshot survives an encode/decode cycle unchanged.
pub fn verify_snapshot_determinism<F>(setup_fn: F, steps: u64) -> bool
where
    F: Fn() -> Match,
{
    let mut game = setup_fn();
    for _ in 0..steps {
        script::autoplay_step(&mut game);
    }

    let before = game.snapshot();
    let Ok(bytes) = before.to_bytes() else {
        return false;
    };
    let Ok(restored) = MatchSnapshot::from_bytes(&bytes) else {
        return false;
    };

    restored == before && restored.to_bytes().is_ok_and(|again| again == bytes)
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism and invariant testing.
pub mod strategies {
    use proptest::prelude::*;

    use crate::script::TurnInput;

    /// Team sizes for 2 to 4 teams of 1 to 4 units.
    pub fn arb_team_sizes() -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::vec(1usize..=4, 2..=4)
    }

    /// Shuffle seeds.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Ability ids from the standard catalog.
    pub fn arb_ability_id() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("punch"),
            Just("gun"),
            Just("grenade"),
            Just("dynamite"),
            Just("boomerang"),
            Just("tshirt_cannon"),
            Just("jetpack"),
            Just("explode"),
            Just("heal_team"),
        ]
    }

    /// A loadout of one to three standard abilities.
    pub fn arb_loadout() -> impl Strategy<Value = Vec<&'static str>> {
        proptest::collection::vec(arb_ability_id(), 1..=3)
    }

    /// One input, weighted towards ordinary turn flow.
    pub fn arb_input() -> impl Strategy<Value = TurnInput> {
        prop_oneof![
            4 => (1u32..=30).prop_map(TurnInput::Tick),
            1 => Just(TurnInput::TransitionComplete),
            3 => Just(TurnInput::EndMovement),
            2 => Just(TurnInput::EndTurn),
            3 => (0usize..3).prop_map(TurnInput::Select),
            3 => (0usize..4).prop_map(TurnInput::Press),
            2 => (0usize..4).prop_map(TurnInput::Release),
            1 => Just(TurnInput::CancelChannel),
            1 => (0usize..8, 1u32..=60)
                .prop_map(|(victim, amount)| TurnInput::Damage { victim, amount }),
            1 => (0usize..8).prop_map(TurnInput::OutOfBounds),
        ]
    }

    /// A script of inputs.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<TurnInput>> {
        proptest::collection::vec(arb_input(), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{duel, started_match, test_config};
    use proptest::prelude::*;
    use sw_core::game::MatchConfig;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_duel_determinism() {
        assert!(verify_match_determinism(
            || duel(&["punch", "grenade", "jetpack"]),
            300
        ));
    }

    #[test]
    fn test_seeded_shuffle_determinism() {
        let setup = || started_match(&[3, 2, 2], &["gun", "dynamite"], MatchConfig::seeded(99));
        assert!(verify_match_determinism(setup, 500));
        assert_eq!(find_first_divergence(setup, 200), None);
    }

    #[test]
    fn test_seed_changes_first_turn() {
        let hashes: Vec<u64> = (0..16)
            .map(|seed| {
                started_match(&[4, 4], &["punch"], MatchConfig::seeded(seed)).state_hash()
            })
            .collect();
        let mut unique = hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        assert!(unique.len() > 1, "every seed produced the same opening");
    }

    #[test]
    fn test_parallel_matches() {
        run_parallel_matches_scoped(
            || started_match(&[2, 2], &["grenade", "punch"], test_config()),
            4,
            400,
        )
        .assert_deterministic();
    }

    #[test]
    fn test_snapshot_survives_encoding_mid_projectile() {
        // Two steps in: movement ended, grenade thrown and in flight.
        assert!(verify_snapshot_determinism(|| duel(&["grenade"]), 2));
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u64, "a")), compute_hash(&(1u64, "a")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_random_scripts_are_deterministic(
            sizes in strategies::arb_team_sizes(),
            loadout in strategies::arb_loadout(),
            seed in strategies::arb_seed(),
            script in strategies::arb_script(60),
        ) {
            let setup = || started_match(&sizes, &loadout, MatchConfig::seeded(seed));
            prop_assert!(verify_script_determinism(setup, &script));
        }
    }
}
