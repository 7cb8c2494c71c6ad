#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Level checker: lints the activation graph and replays the stored
//! solution to prove that a level can be completed.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use chronoshift_core::{Event, ParadoxReason, PlayerAction, Position};
use chronoshift_system_solution::{ReplayMode, Solution, SolutionError, SOLUTION_KEY};
use chronoshift_world::Level;
use thiserror::Error;
use tracing::{debug, warn};

/// Switches controlling a check run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckOptions {
    /// Fail when the level carries no solution.
    pub require_solution: bool,
    /// Decode the solution with naive padding.
    pub replay_mode: ReplayMode,
    /// Report activation sources without targets and targets without sources.
    pub warn_unconnected: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            require_solution: false,
            replay_mode: ReplayMode::Naive,
            warn_unconnected: true,
        }
    }
}

/// Non-fatal observation about a level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelWarning {
    /// An activation source has no targets.
    SourceWithoutTargets {
        /// Source position.
        position: Position,
        /// Symbol of the source.
        symbol: char,
    },
    /// An activation target has no sources.
    TargetWithoutSources {
        /// Target position.
        position: Position,
        /// Symbol of the target.
        symbol: char,
    },
    /// The solution completed the level before every action was used.
    SolvedEarly {
        /// Number of clones when the level was completed.
        clones: usize,
    },
}

impl fmt::Display for LevelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceWithoutTargets { position, symbol } => {
                write!(f, "activator ({symbol}) at {position} has no targets")
            }
            Self::TargetWithoutSources { position, symbol } => {
                write!(f, "activable ({symbol}) at {position} has no sources")
            }
            Self::SolvedEarly { clones } => write!(f, "solution found in jump {clones}"),
        }
    }
}

/// Outcome of a successful check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    /// Warnings collected during the check.
    pub warnings: Vec<LevelWarning>,
    /// Result of replaying the solution; `None` when the level has none.
    pub solved: Option<SolvedLevel>,
}

/// Details of a replayed solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolvedLevel {
    /// Number of clones used.
    pub clones: usize,
    /// Final score.
    pub score: u32,
}

/// Reasons a level fails its check.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UnsolvableError {
    /// A solution was required but the level has none.
    #[error("no solution for {level}")]
    MissingSolution {
        /// Level name.
        level: String,
    },
    /// The stored solution cannot be decoded.
    #[error("lvl {level}: malformed solution: {source}")]
    MalformedSolution {
        /// Level name.
        level: String,
        /// Decoding failure.
        source: SolutionError,
    },
    /// Replaying the solution broke the timeline.
    #[error("lvl {level}: time-paradox in time-jump {clones} ({reason})")]
    TimeParadox {
        /// Level name.
        level: String,
        /// Number of clones when the paradox happened.
        clones: usize,
        /// Paradox raised by the engine.
        reason: ParadoxReason,
    },
    /// The solution ran out without completing the level.
    #[error("lvl {level}: solution does not obtain goal")]
    GoalNotReached {
        /// Level name.
        level: String,
    },
}

/// Collects activation graph warnings.
#[must_use]
pub fn lint(level: &Level) -> Vec<LevelWarning> {
    let mut warnings = Vec::new();
    for field in level.iter_fields() {
        if field.is_activation_source() && field.iter_activation_targets().next().is_none() {
            warnings.push(LevelWarning::SourceWithoutTargets {
                position: field.position(),
                symbol: field.symbol(),
            });
        }
        if field.is_activation_target() && field.iter_activation_sources().next().is_none() {
            warnings.push(LevelWarning::TargetWithoutSources {
                position: field.position(),
                symbol: field.symbol(),
            });
        }
    }
    warnings
}

/// Lints the level and replays its stored solution.
///
/// Succeeds when the level has no solution and none is required, or when
/// the solution ends in a `game-complete` event without a time paradox.
pub fn check_level(level: &mut Level, options: &CheckOptions) -> Result<CheckReport, UnsolvableError> {
    debug!(level = level.name(), "checking level");
    let mut warnings = if options.warn_unconnected {
        lint(level)
    } else {
        Vec::new()
    };
    for warning in &warnings {
        warn!(level = level.name(), "{warning}");
    }

    let Some(text) = level.metadata(SOLUTION_KEY) else {
        if options.require_solution {
            return Err(UnsolvableError::MissingSolution {
                level: level.name().to_owned(),
            });
        }
        return Ok(CheckReport {
            warnings,
            solved: None,
        });
    };
    let solution = Solution::new(text);

    let verdicts: Rc<RefCell<Vec<Event>>> = Rc::default();
    let waiting = Rc::new(Cell::new(false));
    let listener = {
        let verdicts = Rc::clone(&verdicts);
        let waiting = Rc::clone(&waiting);
        level.add_event_listener(move |event| {
            let keep = match event {
                Event::GameComplete { .. } | Event::TimeParadox { .. } => true,
                Event::TimeJump => waiting.get(),
                _ => false,
            };
            if keep {
                verdicts.borrow_mut().push(event.clone());
            }
        })
    };

    let outcome = replay_solution(level, &solution, options.replay_mode, &verdicts, &waiting);
    let _ = level.remove_event_listener(listener);

    let early = outcome?;
    if let Some(clones) = early {
        let warning = LevelWarning::SolvedEarly { clones };
        warn!(level = level.name(), "{warning}");
        warnings.push(warning);
    }

    match first_verdict(&verdicts) {
        Some(Event::GameComplete { score }) => Ok(CheckReport {
            warnings,
            solved: Some(SolvedLevel {
                clones: level.number_of_clones(),
                score,
            }),
        }),
        Some(Event::TimeParadox { reason }) => Err(UnsolvableError::TimeParadox {
            level: level.name().to_owned(),
            clones: level.number_of_clones(),
            reason,
        }),
        _ => Err(UnsolvableError::GoalNotReached {
            level: level.name().to_owned(),
        }),
    }
}

/// Drives the solution through the level. Returns the clone count when the
/// level completed before the script ran out.
fn replay_solution(
    level: &mut Level,
    solution: &Solution,
    mode: ReplayMode,
    verdicts: &RefCell<Vec<Event>>,
    waiting: &Cell<bool>,
) -> Result<Option<usize>, UnsolvableError> {
    level.start();
    for action in solution.actions(mode) {
        let action = action.map_err(|source| UnsolvableError::MalformedSolution {
            level: level.name().to_owned(),
            source,
        })?;
        if matches!(first_verdict(verdicts), Some(Event::GameComplete { .. })) {
            return Ok(Some(level.number_of_clones()));
        }
        level.perform_move(action);
        if let Some(Event::TimeParadox { reason }) = first_verdict(verdicts) {
            return Err(UnsolvableError::TimeParadox {
                level: level.name().to_owned(),
                clones: level.number_of_clones(),
                reason,
            });
        }
    }

    if verdicts.borrow().is_empty() && level.active_player().is_none() {
        // The newest clone retired early; let the older ones finish the loop.
        waiting.set(true);
        let (turn, longest) = level.turn();
        for _ in turn..=longest {
            if !verdicts.borrow().is_empty() {
                break;
            }
            level.perform_move(PlayerAction::SkipTurn);
        }
    }
    Ok(None)
}

fn first_verdict(verdicts: &RefCell<Vec<Event>>) -> Option<Event> {
    verdicts.borrow().first().cloned()
}

/// Replays a solution and records every event the level emits, starting
/// with the first clone's spawn.
pub fn record_replay(
    level: &mut Level,
    solution: &Solution,
    mode: ReplayMode,
) -> Result<Vec<Event>, SolutionError> {
    let recorded: Rc<RefCell<Vec<Event>>> = Rc::default();
    let sink = Rc::clone(&recorded);
    let listener = level.add_event_listener(move |event| sink.borrow_mut().push(event.clone()));
    level.start();

    let mut actions = Vec::new();
    let mut failure = None;
    for action in solution.actions(mode) {
        match action {
            Ok(action) => actions.push(action),
            Err(error) => {
                failure = Some(error);
                break;
            }
        }
    }
    if failure.is_none() {
        for action in actions {
            level.perform_move(action);
        }
    }
    let _ = level.remove_event_listener(listener);

    match failure {
        Some(error) => Err(error),
        None => Ok(recorded.take()),
    }
}
