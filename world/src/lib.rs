#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative level state for Chronoshift.
//!
//! A [`LevelLayout`] is the static description parsed from a level file. A
//! [`Level`] wraps a layout with everything that changes while it is played:
//! clones, crates, the turn counters and the game state. Player actions are
//! resolved through [`apply`], which reports what happened as
//! [`chronoshift_core::Event`] values.

pub mod campaign;
pub mod editor;
mod engine;
pub mod field;
pub mod format;
pub mod listeners;
pub mod moveable;

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use chronoshift_core::{Event, ParadoxReason, PlayerAction, Position};

use crate::{
    field::{Field, FieldGrid},
    format::{LevelError, StructuralError},
    listeners::{EventListeners, ListenerId},
    moveable::{Crate, Crates, PlayerClone},
};

/// Static description of a level: the grid, its activation graph, the
/// initial crate placement and free-form metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelLayout {
    name: String,
    grid: FieldGrid,
    start: Option<Position>,
    goal: Option<Position>,
    crates: BTreeSet<Position>,
    metadata: BTreeMap<String, String>,
}

impl LevelLayout {
    /// Name the layout was loaded under, usually its file path.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.grid.width()
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Field arena of the layout.
    #[must_use]
    pub const fn grid(&self) -> &FieldGrid {
        &self.grid
    }

    /// Field stored at `position`.
    #[must_use]
    pub fn field(&self, position: Position) -> Option<&Field> {
        self.grid.get(position)
    }

    /// Position of the start field.
    #[must_use]
    pub const fn start_location(&self) -> Option<Position> {
        self.start
    }

    /// Position of the goal field.
    #[must_use]
    pub const fn goal_location(&self) -> Option<Position> {
        self.goal
    }

    /// Positions holding a crate when the level begins.
    #[must_use]
    pub const fn crate_positions(&self) -> &BTreeSet<Position> {
        &self.crates
    }

    /// Metadata value stored under the lowercase `key`.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Every metadata entry, sorted by key.
    pub fn iter_metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Stores a metadata entry. Keys are lowercased.
    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        let _ = self.metadata.insert(key.to_lowercase(), value.into());
    }

    /// Renders the layout in the level file format.
    #[must_use]
    pub fn to_level_text(&self) -> String {
        format::render(self, &self.crates)
    }
}

/// Lifecycle of a level being played.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameState {
    /// Loaded but [`Level::start`] has not been called yet.
    Idle,
    /// The newest clone takes commands from the player.
    Running,
    /// The newest clone entered the time machine; earlier clones are replayed
    /// until the loop ends.
    Replaying,
    /// A loop ended with the goal obtained. Only reset actions are accepted.
    Complete,
    /// The timeline broke. Only reset actions are accepted.
    Paradox(ParadoxReason),
}

/// Playable level.
///
/// The time jump itself is not a state: it happens inside a single
/// resolution step and is only visible as the [`Event::TimeJump`] event.
#[derive(Debug)]
pub struct Level {
    layout: LevelLayout,
    start: Position,
    goal: Position,
    sources: Vec<Position>,
    crates: Crates,
    clones: Vec<PlayerClone>,
    state: GameState,
    score: u32,
    turn_no: u32,
    turn_max: u32,
    got_goal: bool,
    listeners: EventListeners,
}

impl Level {
    /// Wraps a layout into a playable level.
    ///
    /// Fields are put back into their initial state. The level is idle until
    /// [`Level::start`] is called.
    pub fn from_layout(mut layout: LevelLayout) -> Result<Self, StructuralError> {
        let start = layout.start.ok_or(StructuralError::MissingStart)?;
        let goal = layout.goal.ok_or(StructuralError::MissingGoal)?;
        let positions: Vec<Position> = layout.grid.iter().map(Field::position).collect();
        for position in positions {
            if let Some(field) = layout.grid.get_mut(position) {
                let _ = field.reset_to_init_state();
            }
        }

        Ok(Self {
            start,
            goal,
            sources: layout.grid.activation_sources(),
            crates: Crates::new(layout.crates.iter().copied()),
            layout,
            clones: Vec::new(),
            state: GameState::Idle,
            score: 0,
            turn_no: 0,
            turn_max: 0,
            got_goal: false,
            listeners: EventListeners::default(),
        })
    }

    /// Parses level text into a playable level.
    pub fn parse(name: &str, text: &str) -> Result<Self, StructuralError> {
        Self::from_layout(format::parse_layout(name, text)?)
    }

    /// Loads the level file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let layout = format::load_layout(path)?;
        Self::from_layout(layout).map_err(|source| LevelError::Structural {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes the level, with crates at their current positions, to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        format::write_level(path.as_ref(), &self.to_level_text())
    }

    /// Renders the level, with crates at their current positions.
    #[must_use]
    pub fn to_level_text(&self) -> String {
        let crates = self.crates.iter().map(Crate::position).collect();
        format::render(&self.layout, &crates)
    }

    /// Registers a listener notified of every event, in resolution order.
    pub fn add_event_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&Event) + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Resets the level and spawns the first clone.
    pub fn start(&mut self) {
        let mut events = Vec::new();
        self.restart(&mut events);
        self.listeners.notify(&events);
    }

    /// Resolves one player action and notifies listeners.
    pub fn perform_move(&mut self, action: PlayerAction) {
        let mut events = Vec::new();
        apply(self, action, &mut events);
    }

    /// Static layout the level was built from.
    #[must_use]
    pub const fn layout(&self) -> &LevelLayout {
        &self.layout
    }

    /// Name the level was loaded under.
    #[must_use]
    pub fn name(&self) -> &str {
        self.layout.name()
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.layout.width()
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.layout.height()
    }

    /// Metadata value stored under the lowercase `key`.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.layout.metadata(key)
    }

    /// Position of the start field.
    #[must_use]
    pub const fn start_location(&self) -> Position {
        self.start
    }

    /// Position of the goal field.
    #[must_use]
    pub const fn goal_location(&self) -> Position {
        self.goal
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Accumulated score; lower is better.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Current turn number and the longest loop seen so far.
    #[must_use]
    pub const fn turn(&self) -> (u32, u32) {
        (self.turn_no, self.turn_max)
    }

    /// Whether a clone reached the goal during the current loop.
    #[must_use]
    pub const fn got_goal(&self) -> bool {
        self.got_goal
    }

    /// Clone taking commands from the player; `None` while replaying.
    #[must_use]
    pub fn active_player(&self) -> Option<&PlayerClone> {
        match self.state {
            GameState::Running => self.clones.last(),
            _ => None,
        }
    }

    /// Number of clones, including the active one.
    #[must_use]
    pub fn number_of_clones(&self) -> usize {
        self.clones.len()
    }

    /// Clones in creation order.
    pub fn iter_clones(&self) -> impl Iterator<Item = &PlayerClone> {
        self.clones.iter()
    }

    /// Field stored at `position`.
    #[must_use]
    pub fn get_field(&self, position: Position) -> Option<&Field> {
        self.layout.grid.get(position)
    }

    /// Fields in row-major order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &Field> {
        self.layout.grid.iter()
    }

    /// Crate resting on `position`.
    #[must_use]
    pub fn get_crate_at(&self, position: Position) -> Option<&Crate> {
        self.crates.at(position)
    }

    /// Every crate of the level.
    #[must_use]
    pub const fn crates(&self) -> &Crates {
        &self.crates
    }
}

/// Applies the provided action to the level, mutating state deterministically.
///
/// Events are appended to `out_events` in resolution order and delivered to
/// registered listeners in the same order.
pub fn apply(level: &mut Level, action: PlayerAction, out_events: &mut Vec<Event>) {
    let first = out_events.len();
    level.play(action, out_events);
    level.listeners.notify(&out_events[first..]);
}

/// Query functions that provide read-only access to the level state.
pub mod query {
    use chronoshift_core::{CloneId, PlayerAction, Position};

    use super::{GameState, Level};

    /// Read-only snapshot of a clone.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct CloneSnapshot {
        /// Identifier of the clone.
        pub id: CloneId,
        /// Current position.
        pub position: Position,
        /// Number of recorded actions.
        pub recorded: usize,
        /// Whether the player currently controls the clone.
        pub active: bool,
    }

    /// Captures a snapshot of every clone in creation order.
    #[must_use]
    pub fn clone_view(level: &Level) -> Vec<CloneSnapshot> {
        let active = level.active_player().map(|clone| clone.id());
        level
            .iter_clones()
            .map(|clone| CloneSnapshot {
                id: clone.id(),
                position: clone.position(),
                recorded: clone.actions().len(),
                active: Some(clone.id()) == active,
            })
            .collect()
    }

    /// Action logs of every clone, in creation order.
    #[must_use]
    pub fn action_logs(level: &Level) -> Vec<&[PlayerAction]> {
        level.iter_clones().map(|clone| clone.actions()).collect()
    }

    /// Whether the level accepts only reset actions.
    #[must_use]
    pub fn is_finished(level: &Level) -> bool {
        matches!(level.state(), GameState::Complete | GameState::Paradox(_))
    }

    /// Renders the current board, one string per row.
    ///
    /// The active clone is drawn as `@`, other clones as `&` and crates as
    /// `c`. Gates show their current state.
    #[must_use]
    pub fn board_rows(level: &Level) -> Vec<String> {
        let active = level.active_player().map(|clone| clone.position());
        let width = level.width().max(1) as usize;
        let mut rows = Vec::with_capacity(level.height() as usize);
        let mut row = String::with_capacity(width);
        for field in level.iter_fields() {
            let position = field.position();
            let symbol = if Some(position) == active {
                '@'
            } else if level.iter_clones().any(|clone| clone.position() == position) {
                '&'
            } else if level.get_crate_at(position).is_some() {
                'c'
            } else {
                field.display_symbol()
            };
            row.push(symbol);
            if row.chars().count() == width {
                rows.push(std::mem::take(&mut row));
            }
        }
        rows
    }
}
