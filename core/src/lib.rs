#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Chronoshift engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative level state, and pure systems. Adapters submit
//! [`PlayerAction`] values describing what the controllable clone does next,
//! the world resolves one tick per action, and then broadcasts [`Event`]
//! values in the order the mutations happened. Editors receive
//! [`EditorEvent`] values for structural changes instead.

use std::{
    fmt,
    ops::{Add, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header line that opens every level file.
pub const LEVEL_HEADER: &str = "2D SuperFun!";

/// Header line that opens every campaign file.
pub const CAMPAIGN_HEADER: &str = "JikiBan Campaign";

/// Location of a single grid field expressed as column and row coordinates.
///
/// `(0, 0)` is the north-west corner. Ordering compares the column first and
/// the row second, which is the canonical iteration order for activation
/// edges.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    x: i32,
    y: i32,
}

impl Position {
    /// Creates a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the position.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Zero-based row of the position.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Position reached by taking one step in `direction`.
    #[must_use]
    pub fn moved(self, direction: Direction) -> Self {
        self + direction.delta()
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, other: Position) -> Position {
        Position::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, other: Position) -> Position {
        Position::new(self.x - other.x, self.y - other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Orthogonal movement directions, plus the "stay put" direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
    /// No movement at all.
    NoAct,
}

impl Direction {
    /// Vector added to a position when stepping in this direction.
    #[must_use]
    pub const fn delta(self) -> Position {
        match self {
            Self::North => Position::new(0, -1),
            Self::East => Position::new(1, 0),
            Self::South => Position::new(0, 1),
            Self::West => Position::new(-1, 0),
            Self::NoAct => Position::new(0, 0),
        }
    }
}

/// Discrete actions accepted by the level, one per call.
///
/// The first six are the player vocabulary recorded in clone logs; the two
/// reset actions roll the level back and are never recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Step north.
    MoveUp,
    /// Step east.
    MoveRight,
    /// Step south.
    MoveDown,
    /// Step west.
    MoveLeft,
    /// Stay in place for one tick.
    SkipTurn,
    /// Retire the clone into the time machine on the start field.
    EnterTimeMachine,
    /// Discard the most recent loop and replay it from the start.
    ResetTimeJump,
    /// Discard every loop and start the level over.
    ResetLevel,
}

impl PlayerAction {
    /// Every action in declaration order.
    pub const ALL: [PlayerAction; 8] = [
        Self::MoveUp,
        Self::MoveRight,
        Self::MoveDown,
        Self::MoveLeft,
        Self::SkipTurn,
        Self::EnterTimeMachine,
        Self::ResetTimeJump,
        Self::ResetLevel,
    ];

    /// Canonical vocabulary string of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MoveUp => "move-up",
            Self::MoveRight => "move-right",
            Self::MoveDown => "move-down",
            Self::MoveLeft => "move-left",
            Self::SkipTurn => "skip-turn",
            Self::EnterTimeMachine => "enter-time-machine",
            Self::ResetTimeJump => "reset-time-jump",
            Self::ResetLevel => "reset-level",
        }
    }

    /// Direction travelled by the action, `None` for the reset actions.
    ///
    /// Skipping a turn and entering the time machine both map to
    /// [`Direction::NoAct`].
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::MoveUp => Some(Direction::North),
            Self::MoveRight => Some(Direction::East),
            Self::MoveDown => Some(Direction::South),
            Self::MoveLeft => Some(Direction::West),
            Self::SkipTurn | Self::EnterTimeMachine => Some(Direction::NoAct),
            Self::ResetTimeJump | Self::ResetLevel => None,
        }
    }

    /// Reports whether the action is one of the four movement actions.
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(
            self,
            Self::MoveUp | Self::MoveRight | Self::MoveDown | Self::MoveLeft
        )
    }

    /// Reports whether the action rolls the level back instead of playing a tick.
    #[must_use]
    pub const fn is_reset(self) -> bool {
        matches!(self, Self::ResetTimeJump | Self::ResetLevel)
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayerAction {
    type Err = ParseActionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| ParseActionError(value.to_owned()))
    }
}

/// Error returned when a string is not part of the action vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown action `{0}`")]
pub struct ParseActionError(pub String);

/// Identifier of a player clone; clone `n` is the one created in loop `n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CloneId(u32);

impl CloneId {
    /// Creates a new clone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a crate, stable for the lifetime of a loaded level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrateId(u32);

impl CrateId {
    /// Creates a new crate identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Occupant that an event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// A player clone.
    Clone(CloneId),
    /// A pushable crate.
    Crate(CrateId),
}

/// Contradictions detected while resolving a tick.
///
/// A paradox is a terminal simulation outcome rather than a program error;
/// the level keeps the reason so adapters can present it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ParadoxReason {
    /// A clone entered the time machine away from the start field.
    #[error("clone does not make it back to start (it is at {position})")]
    CloneNotAtStart {
        /// Clone that tried to enter the time machine.
        clone: CloneId,
        /// Field the clone was standing on.
        position: Position,
    },
    /// More than one clone pushed the same crate during one tick.
    #[error("crate on {position} was moved in two different directions")]
    CrateMovedTwice {
        /// Field the crate occupied before the tick.
        position: Position,
    },
    /// Two crates were pushed onto the same field during one tick.
    #[error("two crates collided at {position}")]
    CratesCollided {
        /// Field both crates ended on.
        position: Position,
    },
    /// A crate ended the tick on a field that cannot be entered.
    #[error("crate is on an unreachable field at end of turn: {position}")]
    CrateOnUnreachableField {
        /// Field holding the crate.
        position: Position,
    },
    /// A clone and a crate ended the tick on the same field.
    #[error("clone and crate on the same field {position} [non-determinism]")]
    CloneUnderCrate {
        /// Shared field.
        position: Position,
    },
    /// A clone ended the tick on a field that cannot be entered.
    #[error("clone is on an unreachable field at end of turn: {position}")]
    CloneOnUnreachableField {
        /// Field holding the clone.
        position: Position,
    },
}

/// Events broadcast by the level while resolving actions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// A new controllable clone appeared on the start field.
    CloneAdded {
        /// Identifier of the new clone.
        clone: CloneId,
        /// Field the clone appeared on.
        position: Position,
    },
    /// A clone was discarded by a reset action.
    CloneRemoved {
        /// Identifier of the discarded clone.
        clone: CloneId,
    },
    /// A clone stepped onto a neighbouring field.
    CloneMoved {
        /// Clone that moved.
        clone: CloneId,
        /// Action the clone performed.
        action: PlayerAction,
        /// Field the clone left.
        from: Position,
        /// Field the clone entered.
        to: Position,
    },
    /// A clone attempted a move that had no effect.
    CloneBlocked {
        /// Clone whose move failed.
        clone: CloneId,
        /// Action the clone attempted.
        action: PlayerAction,
        /// Field the clone stayed on.
        position: Position,
    },
    /// A clone skipped its turn.
    CloneWaited {
        /// Clone that waited.
        clone: CloneId,
        /// Field the clone stayed on.
        position: Position,
    },
    /// A clone retired into the time machine.
    CloneEnteredTimeMachine {
        /// Clone that retired.
        clone: CloneId,
    },
    /// A crate was pushed by a clone.
    CratePushed {
        /// Crate that moved.
        crate_id: CrateId,
        /// Field the crate left.
        from: Position,
        /// Field the crate entered.
        to: Position,
    },
    /// A reset teleported a moveable back to its loop-start field.
    MoveableJumped {
        /// Moveable that was teleported.
        actor: Actor,
        /// Field the moveable now occupies.
        to: Position,
    },
    /// A field became active.
    FieldActivated {
        /// Field that changed state.
        position: Position,
    },
    /// A field became inactive.
    FieldDeactivated {
        /// Field that changed state.
        position: Position,
    },
    /// A clone reached the goal for the first time in this loop.
    GoalObtained,
    /// A reset discarded the loop in which the goal was obtained.
    GoalLost,
    /// The tick finished and the next one is awaiting input.
    EndOfTurn {
        /// Tick that will be resolved next.
        turn: u32,
    },
    /// Every clone finished its log without reaching the goal; a new loop begins.
    TimeJump,
    /// The goal was obtained and every clone returned safely.
    GameComplete {
        /// Final score (lower is better).
        score: u32,
    },
    /// Resolution found a contradiction; the level stops accepting moves.
    TimeParadox {
        /// Human-readable cause of the paradox.
        reason: ParadoxReason,
    },
}

impl Event {
    /// Stable kebab-case name of the event type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CloneAdded { .. } => "add-player-clone",
            Self::CloneRemoved { .. } => "remove-player-clone",
            Self::CloneMoved { .. } => "clone-moved",
            Self::CloneBlocked { .. } => "clone-blocked",
            Self::CloneWaited { .. } => "skip-turn",
            Self::CloneEnteredTimeMachine { .. } => "enter-time-machine",
            Self::CratePushed { .. } => "crate-pushed",
            Self::MoveableJumped { .. } => "jump-moveable",
            Self::FieldActivated { .. } => "field-activated",
            Self::FieldDeactivated { .. } => "field-deactivated",
            Self::GoalObtained => "goal-obtained",
            Self::GoalLost => "goal-lost",
            Self::EndOfTurn { .. } => "end-of-turn",
            Self::TimeJump => "time-jump",
            Self::GameComplete { .. } => "game-complete",
            Self::TimeParadox { .. } => "time-paradox",
        }
    }
}

/// Events broadcast by an editable level after structural changes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditorEvent {
    /// The whole grid was replaced or resized.
    MapReplaced {
        /// New number of columns.
        width: u32,
        /// New number of rows.
        height: u32,
    },
    /// A single tile was replaced.
    TileReplaced {
        /// Field that was replaced.
        position: Position,
    },
    /// A start or goal field was demoted to floor because a new one was placed.
    SpecialFieldRemoved {
        /// Field that lost its special role.
        position: Position,
    },
    /// A crate was placed on a field.
    CrateAdded {
        /// Field holding the crate.
        position: Position,
    },
    /// A crate was removed from a field.
    CrateRemoved {
        /// Field that held the crate.
        position: Position,
    },
    /// An activation edge was added.
    FieldConnected {
        /// Activation source.
        source: Position,
        /// Activation target.
        target: Position,
    },
    /// An activation edge was removed.
    FieldDisconnected {
        /// Activation source.
        source: Position,
        /// Activation target.
        target: Position,
    },
    /// A gate's initial state changed.
    InitialStateChanged {
        /// Gate that changed.
        position: Position,
        /// Whether the gate now starts open.
        open: bool,
    },
}
