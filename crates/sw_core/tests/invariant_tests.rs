//! Property tests over random input scripts.
//!
//! Whatever a player or the environment does, the match must keep a
//! single active actor, move phases forward within a turn, and declare
//! a winner at most once.

use proptest::prelude::*;
use sw_core::events::TurnEvent;
use sw_core::game::{Match, MatchConfig};
use sw_core::phase::Phase;
use sw_test_utils::determinism::strategies::{
    arb_loadout, arb_script, arb_seed, arb_team_sizes,
};
use sw_test_utils::determinism::verify_script_determinism;
use sw_test_utils::fixtures::started_match;
use sw_test_utils::script::{self, TurnInput};

/// Tracks what the event log has shown so far.
#[derive(Default)]
struct Observer {
    phase: Phase,
    wins: usize,
}

impl Observer {
    fn observe(&mut self, events: &[TurnEvent]) -> Result<(), TestCaseError> {
        for event in events {
            match event {
                TurnEvent::PhaseChanged(next) => {
                    prop_assert!(
                        self.phase.can_advance_to(*next),
                        "phase regressed {:?} -> {:?}",
                        self.phase,
                        next
                    );
                    self.phase = *next;
                }
                TurnEvent::TeamWon(_) => self.wins += 1,
                _ => {}
            }
        }
        prop_assert!(self.wins <= 1, "TeamWon fired {} times", self.wins);
        Ok(())
    }
}

fn check_state(game: &Match) -> Result<(), TestCaseError> {
    prop_assert!(game.actors().turn_active_count() <= 1);

    match game.winner() {
        Some(team) => {
            prop_assert_eq!(game.active_actor(), None);
            prop_assert_eq!(game.phase(), Phase::Idle);
            prop_assert_eq!(game.actors().turn_active_count(), 0);
            let survivors = game.actors().living();
            prop_assert!(survivors
                .iter()
                .all(|id| game.actors().get(*id).is_some_and(|a| a.team() == team)));
        }
        None => {
            let active = game.active_actor();
            prop_assert!(active.is_some());
            let actor = active.and_then(|id| game.actors().get(id));
            prop_assert!(actor.is_some_and(|a| a.is_alive() && a.is_turn_active()));
        }
    }
    Ok(())
}

fn run_checked(game: &mut Match, script: &[TurnInput]) -> Result<(), TestCaseError> {
    let mut observer = Observer::default();
    observer.observe(&game.drain_events())?;
    check_state(game)?;
    for input in script {
        script::apply(game, input);
        observer.observe(&game.drain_events())?;
        check_state(game)?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold_for_random_scripts(
        sizes in arb_team_sizes(),
        loadout in arb_loadout(),
        seed in arb_seed(),
        script in arb_script(80),
    ) {
        let mut game = started_match(&sizes, &loadout, MatchConfig::seeded(seed));
        run_checked(&mut game, &script)?;
    }

    #[test]
    fn prop_random_scripts_replay_identically(
        sizes in arb_team_sizes(),
        loadout in arb_loadout(),
        seed in arb_seed(),
        script in arb_script(60),
    ) {
        prop_assert!(verify_script_determinism(
            || started_match(&sizes, &loadout, MatchConfig::seeded(seed)),
            &script,
        ));
    }

    #[test]
    fn prop_autoplay_always_finds_a_winner(
        sizes in arb_team_sizes(),
        loadout in arb_loadout(),
        seed in arb_seed(),
    ) {
        // Autoplay always uses the first slot, so lead with a damaging one.
        let mut ids = vec!["gun"];
        ids.extend(loadout.into_iter().take(2));
        let mut game = started_match(&sizes, &ids, MatchConfig::seeded(seed));
        let winner = script::autoplay_round(&mut game, 50_000);
        prop_assert!(winner.is_some());
        let wins = game
            .drain_events()
            .iter()
            .filter(|e| matches!(e, TurnEvent::TeamWon(_)))
            .count();
        prop_assert_eq!(wins, 1);
    }
}
