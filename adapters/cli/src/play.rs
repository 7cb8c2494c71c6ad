//! `replay` and `play` subcommands.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use chronoshift_core::{Actor, Event, PlayerAction};
use chronoshift_system_checker::record_replay;
use chronoshift_system_solution::{token_action, ReplayMode, Solution, SOLUTION_KEY};
use chronoshift_world::{self as world, query, GameState, Level};
use clap::{Args, ValueEnum};
use serde::Serialize;

/// Output format of the `replay` subcommand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// One line per event followed by the final board.
    Text,
    /// A single JSON document.
    Json,
}

/// Arguments of the `replay` subcommand.
#[derive(Debug, Args)]
pub(crate) struct ReplayArgs {
    /// Level file whose stored solution is replayed.
    level: PathBuf,
    /// How to print the replay.
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
    /// Replay the solution exactly as written, without loop padding.
    #[arg(long)]
    exact_replay: bool,
}

#[derive(Debug, Serialize)]
struct ReplayDocument<'a> {
    level: &'a str,
    score: u32,
    clones: usize,
    complete: bool,
    events: &'a [Event],
    board: Vec<String>,
}

impl ReplayArgs {
    /// Replays the stored solution and prints every event it produces.
    pub(crate) fn execute(self) -> Result<()> {
        let mut level = Level::load(&self.level)?;
        let Some(text) = level.metadata(SOLUTION_KEY) else {
            bail!("level {} has no solution", self.level.display());
        };
        let solution = Solution::new(text);
        let mode = if self.exact_replay {
            ReplayMode::Exact
        } else {
            ReplayMode::Naive
        };
        let events = record_replay(&mut level, &solution, mode)
            .with_context(|| format!("failed to replay {}", self.level.display()))?;

        let mut out = io::stdout().lock();
        match self.format {
            OutputFormat::Text => {
                for event in &events {
                    writeln!(out, "{}", describe(event))?;
                }
                for row in query::board_rows(&level) {
                    writeln!(out, "{row}")?;
                }
                writeln!(
                    out,
                    "score {} with {} clones",
                    level.score(),
                    level.number_of_clones()
                )?;
            }
            OutputFormat::Json => {
                let document = ReplayDocument {
                    level: level.name(),
                    score: level.score(),
                    clones: level.number_of_clones(),
                    complete: level.state() == &GameState::Complete,
                    events: &events,
                    board: query::board_rows(&level),
                };
                serde_json::to_writer_pretty(&mut out, &document)
                    .context("failed to write replay json")?;
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

/// Arguments of the `play` subcommand.
#[derive(Debug, Args)]
pub(crate) struct PlayArgs {
    /// Level file to play.
    level: PathBuf,
}

impl PlayArgs {
    /// Reads one action per line from stdin and prints the resulting events.
    ///
    /// Actions are either full names (`move-right`) or solution tokens (`E`).
    /// Once stdin is exhausted the clone logs are printed as a solution.
    pub(crate) fn execute(self) -> Result<()> {
        let mut level = Level::load(&self.level)?;
        let stdin = io::stdin();
        let mut out = io::stdout().lock();

        level.start();
        print_board(&mut out, &level)?;
        for line in stdin.lock().lines() {
            let line = line.context("failed to read action from stdin")?;
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            let Some(action) = parse_action(input) else {
                writeln!(out, "unknown action {input:?}")?;
                continue;
            };

            let mut events = Vec::new();
            world::apply(&mut level, action, &mut events);
            for event in &events {
                writeln!(out, "{}", describe(event))?;
            }
            print_board(&mut out, &level)?;
        }

        let solution = Solution::encode(query::action_logs(&level));
        writeln!(out, "{SOLUTION_KEY}:")?;
        writeln!(out, " {}", solution.as_str())?;
        Ok(())
    }
}

fn print_board(out: &mut impl Write, level: &Level) -> Result<()> {
    for row in query::board_rows(level) {
        writeln!(out, "{row}")?;
    }
    let (turn, longest) = level.turn();
    writeln!(
        out,
        "turn {turn}/{longest}, score {}, clones {}",
        level.score(),
        level.number_of_clones()
    )?;
    Ok(())
}

fn parse_action(input: &str) -> Option<PlayerAction> {
    let mut tokens = input.chars();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) => token_action(token.to_ascii_uppercase()),
        _ => input.parse().ok(),
    }
}

/// Single-line rendering of an event.
fn describe(event: &Event) -> String {
    let name = event.name();
    match event {
        Event::CloneAdded { clone, position } | Event::CloneWaited { clone, position } => {
            format!("{name} clone {} at {position}", clone.get())
        }
        Event::CloneRemoved { clone } | Event::CloneEnteredTimeMachine { clone } => {
            format!("{name} clone {}", clone.get())
        }
        Event::CloneMoved {
            clone,
            action,
            from,
            to,
        } => format!("{name} clone {} {action} {from} -> {to}", clone.get()),
        Event::CloneBlocked {
            clone,
            action,
            position,
        } => format!("{name} clone {} {action} at {position}", clone.get()),
        Event::CratePushed { crate_id, from, to } => {
            format!("{name} crate {} {from} -> {to}", crate_id.get())
        }
        Event::MoveableJumped { actor, to } => match actor {
            Actor::Clone(clone) => format!("{name} clone {} to {to}", clone.get()),
            Actor::Crate(crate_id) => format!("{name} crate {} to {to}", crate_id.get()),
        },
        Event::FieldActivated { position } | Event::FieldDeactivated { position } => {
            format!("{name} {position}")
        }
        Event::EndOfTurn { turn } => format!("{name} {turn}"),
        Event::GameComplete { score } => format!("{name} score {score}"),
        Event::TimeParadox { reason } => format!("{name}: {reason}"),
        Event::GoalObtained | Event::GoalLost | Event::TimeJump => name.to_owned(),
    }
}
