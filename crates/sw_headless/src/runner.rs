//! Interactive runner: one match driven by JSON commands.

use std::io::{self, BufRead, Write};

use sw_core::actor::TeamId;
use sw_core::controller::ConfirmOutcome;
use sw_core::game::Match;
use sw_core::math::{Fixed, Vec3Fixed};
use sw_core::orchestrator::EndTurnOutcome;
use tracing::{debug, info, warn};

use crate::protocol::{Command, Response, StateView};
use crate::scenario::{Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output state after every command that advances time.
    pub auto_state_output: bool,
    /// Built-in scenario name or RON path; `skirmish` when absent.
    pub scenario: Option<String>,
    /// Overrides the scenario's turn order seed.
    pub seed: Option<u64>,
}

/// Drives a [`Match`] from protocol commands.
pub struct HeadlessRunner {
    config: HeadlessConfig,
    game: Match,
    round_announced: bool,
    quit: bool,
}

impl HeadlessRunner {
    /// Load the configured scenario and start its first round.
    pub fn with_config(config: HeadlessConfig) -> Result<Self, ScenarioError> {
        let scenario = match &config.scenario {
            Some(name) => Scenario::resolve(name)?,
            None => Scenario::default(),
        };
        let catalog = scenario.load_catalog()?;
        let mut match_config = scenario.config;
        if let Some(seed) = config.seed {
            match_config.orchestrator.seed = seed;
        }
        let mut game = Match::new(scenario.session, catalog, match_config)?;
        game.start_round()?;
        info!(scenario = %scenario.name, "Interactive match ready");
        Ok(Self {
            config,
            game,
            round_announced: false,
            quit: false,
        })
    }

    /// The match being driven.
    #[must_use]
    pub const fn game(&self) -> &Match {
        &self.game
    }

    /// Whether a `quit` command was handled.
    #[must_use]
    pub const fn should_quit(&self) -> bool {
        self.quit
    }

    /// Banner sent before the first command.
    #[must_use]
    pub fn greeting(&self) -> Response {
        Response::ready(self.game.round())
    }

    /// Handle a raw input line.
    pub fn handle_line(&mut self, line: &str) -> Vec<Response> {
        match Command::from_json(line) {
            Ok(cmd) => self.handle(cmd),
            Err(e) => vec![Response::error(format!("Invalid command: {e}"), None)],
        }
    }

    /// Execute one command and collect everything it produced.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        debug!(?cmd, "Command");
        let name = cmd.name();
        let advances = matches!(
            cmd,
            Command::Tick { .. }
                | Command::Press { .. }
                | Command::Release { .. }
                | Command::EndTurn
                | Command::NextRound
        );

        let mut out = Vec::new();
        let result = self.execute(cmd, &mut out);

        out.extend(
            self.game
                .drain_events()
                .into_iter()
                .map(|event| Response::Event { event }),
        );
        match result {
            Ok(true) => out.push(Response::ack(name)),
            Ok(false) => {}
            Err(message) => out.push(Response::error(message, Some(name))),
        }
        self.announce_round(&mut out);
        if advances && self.config.auto_state_output {
            out.push(Response::State(StateView::capture(&self.game)));
        }
        out
    }

    /// Returns whether to acknowledge.
    fn execute(&mut self, cmd: Command, out: &mut Vec<Response>) -> Result<bool, String> {
        let phase = self.game.phase();
        let ignored = || format!("ignored in phase {phase}");
        match cmd {
            Command::Tick { count } => {
                for _ in 0..count {
                    if self.game.winner().is_some() {
                        break;
                    }
                    self.game.tick();
                }
                Ok(true)
            }
            Command::Query => {
                out.push(Response::State(StateView::capture(&self.game)));
                Ok(false)
            }
            Command::Hash => {
                out.push(Response::StateHash {
                    tick: self.game.world().tick_count(),
                    hash: self.game.state_hash(),
                });
                Ok(false)
            }
            Command::TransitionComplete => self
                .game
                .transition_complete()
                .then_some(true)
                .ok_or_else(ignored),
            Command::EndMovement => self.game.end_movement().then_some(true).ok_or_else(ignored),
            Command::Position { actor, x, y, z } => {
                let coord = |v: f64| {
                    Fixed::checked_from_num(v).ok_or_else(|| format!("coordinate {v} out of range"))
                };
                let position = Vec3Fixed::new(coord(x)?, coord(y)?, coord(z)?);
                self.game
                    .set_position(actor, position)
                    .map_err(|e| e.to_string())?;
                Ok(true)
            }
            Command::Select { slot } => self
                .game
                .select_slot(slot)
                .then_some(true)
                .ok_or_else(|| format!("slot {slot} not selectable")),
            Command::Press { target } => confirm(self.game.press_confirm(target), ignored),
            Command::Release { target } => confirm(self.game.release_confirm(target), ignored),
            Command::EndTurn => match self.game.end_turn() {
                EndTurnOutcome::Ignored => Err(ignored()),
                EndTurnOutcome::Deferred => Err("turn held open by a follow".to_string()),
                _ => Ok(true),
            },
            Command::CancelChannel => self
                .game
                .cancel_channel()
                .then_some(true)
                .ok_or_else(|| "no channel running".to_string()),
            Command::Damage { target, amount } => {
                if !self.game.actors().is_alive(target) {
                    return Err(format!("actor {target} is not alive"));
                }
                self.game.apply_damage(target, amount, None, "Environment");
                Ok(true)
            }
            Command::OutOfBounds { actor } => {
                if !self.game.actors().is_alive(actor) {
                    return Err(format!("actor {actor} is not alive"));
                }
                self.game.kill_out_of_bounds(actor);
                Ok(true)
            }
            Command::NextRound => {
                let wiped_out = self.game.actors().living().is_empty();
                if self.game.winner().is_none() && !wiped_out {
                    return Err("round still in progress".to_string());
                }
                if self.game.session().is_complete() {
                    return Err("match is over".to_string());
                }
                self.game.start_round().map_err(|e| e.to_string())?;
                self.round_announced = false;
                Ok(true)
            }
            Command::Quit => {
                self.quit = true;
                out.push(Response::Bye);
                Ok(false)
            }
        }
    }

    /// Record a decided round once and report it.
    fn announce_round(&mut self, out: &mut Vec<Response>) {
        if self.round_announced {
            return;
        }
        let winner = match self.game.finish_round() {
            Ok(Some(winner)) => winner,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to record round");
                return;
            }
        };
        self.round_announced = true;
        out.push(Response::RoundOver {
            round: self.game.round(),
            winner: self.team_name(winner),
        });
        if self.game.session().is_complete() {
            let winner = self
                .game
                .session()
                .match_winner()
                .map(|t| self.team_name(t));
            info!(?winner, "Match over");
            out.push(Response::MatchOver { winner });
        }
    }

    fn team_name(&self, team: TeamId) -> String {
        self.game
            .session()
            .teams
            .get(usize::from(team))
            .map_or_else(|| format!("Team {team}"), |t| t.name.clone())
    }

    /// Serve commands from `input` until EOF or `quit`.
    pub fn run_io<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(self.greeting().to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            for response in self.handle_line(line) {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if self.quit {
                break;
            }
        }
        Ok(())
    }

    /// Serve stdin/stdout.
    pub fn run(mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_io(stdin.lock(), stdout.lock())
    }
}

fn confirm(outcome: ConfirmOutcome, ignored: impl FnOnce() -> String) -> Result<bool, String> {
    match outcome {
        ConfirmOutcome::Ignored => Err(ignored()),
        ConfirmOutcome::Charging | ConfirmOutcome::Resolved { .. } => Ok(true),
    }
}
