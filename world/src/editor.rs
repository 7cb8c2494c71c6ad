//! Mutable level layouts for editing tools.
//!
//! Every change is expressed as an [`EditorChange`] and reported back as
//! [`EditorEvent`] values, so an editor front-end can redraw incrementally.

use std::collections::{BTreeMap, BTreeSet};

use chronoshift_core::{EditorEvent, Position};
use thiserror::Error;
use tracing::debug;

use crate::{
    field::{CapabilityError, Field, FieldGrid, FieldKind},
    format::StructuralError,
    Level, LevelLayout,
};

const MIN_SIDE: u32 = 3;
const UNTITLED: &str = "untitled";

/// Tiles that can be painted onto a layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// Plain floor.
    Floor,
    /// Wall.
    Wall,
    /// Floor holding a crate.
    Crate,
    /// Gate; new gates start open.
    Gate,
    /// Button.
    Button,
    /// One-time button.
    OneTimeButton,
    /// One-time passage.
    OneTimePassage,
    /// Pallet.
    Pallet,
    /// Start field; replaces the previous one.
    Start,
    /// Goal field; replaces the previous one.
    Goal,
}

impl TileKind {
    fn field(self, position: Position) -> Field {
        match self {
            Self::Floor | Self::Crate => Field::new(FieldKind::Floor, position),
            Self::Wall => Field::new(FieldKind::Wall, position),
            Self::Gate => Field::gate(position, true),
            Self::Button => Field::new(FieldKind::Button, position),
            Self::OneTimeButton => Field::new(FieldKind::OneTimeButton, position),
            Self::OneTimePassage => Field::new(FieldKind::OneTimePassage, position),
            Self::Pallet => Field::new(FieldKind::Pallet, position),
            Self::Start => Field::new(FieldKind::Start, position),
            Self::Goal => Field::new(FieldKind::Goal, position),
        }
    }
}

/// Edits accepted by [`EditableLevel::perform_change`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorChange {
    /// Adds the edge if missing, removes it otherwise.
    ToggleConnection {
        /// Activation source.
        source: Position,
        /// Activation target.
        target: Position,
    },
    /// Sets whether a gate starts open. Ignored for other fields.
    SetInitialState {
        /// Gate position.
        position: Position,
        /// Whether the gate starts open.
        open: bool,
    },
    /// Paints a tile. Positions on the outer border are ignored.
    ReplaceTile {
        /// Painted position.
        position: Position,
        /// New tile.
        tile: TileKind,
    },
    /// Replaces the map with one of a new size.
    Resize {
        /// New number of columns.
        width: u32,
        /// New number of rows.
        height: u32,
        /// Offset applied to the interior of the current map; `None` starts
        /// from a map of walls.
        translate: Option<Position>,
    },
}

/// Failures raised by editor changes.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EditError {
    /// The edge cannot be added.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    /// A map must be at least three fields wide and high.
    #[error("map must be at least 3x3 (got {width}x{height})")]
    TooSmall {
        /// Requested columns.
        width: u32,
        /// Requested rows.
        height: u32,
    },
}

/// Layout under construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditableLevel {
    layout: LevelLayout,
}

impl EditableLevel {
    /// Creates an untitled map of walls.
    pub fn new(width: u32, height: u32) -> Result<Self, EditError> {
        check_size(width, height)?;
        Ok(Self {
            layout: blank_layout(width, height),
        })
    }

    /// Wraps an existing layout for editing.
    #[must_use]
    pub fn from_layout(layout: LevelLayout) -> Self {
        Self { layout }
    }

    /// Layout being edited.
    #[must_use]
    pub const fn layout(&self) -> &LevelLayout {
        &self.layout
    }

    /// Stores a metadata entry.
    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.layout.set_metadata(key, value);
    }

    /// Renders the layout in the level file format.
    #[must_use]
    pub fn to_level_text(&self) -> String {
        self.layout.to_level_text()
    }

    /// Builds a playable level from the current layout.
    pub fn playable(&self) -> Result<Level, StructuralError> {
        Level::from_layout(self.layout.clone())
    }

    /// Applies one change, appending the resulting events to `out_events`.
    pub fn perform_change(
        &mut self,
        change: EditorChange,
        out_events: &mut Vec<EditorEvent>,
    ) -> Result<(), EditError> {
        match change {
            EditorChange::ToggleConnection { source, target } => {
                self.toggle_connection(source, target, out_events)
            }
            EditorChange::SetInitialState { position, open } => {
                self.set_initial_state(position, open, out_events);
                Ok(())
            }
            EditorChange::ReplaceTile { position, tile } => {
                self.replace_tile(position, tile, out_events);
                Ok(())
            }
            EditorChange::Resize {
                width,
                height,
                translate,
            } => self.new_map(width, height, translate, out_events),
        }
    }

    fn toggle_connection(
        &mut self,
        source: Position,
        target: Position,
        out: &mut Vec<EditorEvent>,
    ) -> Result<(), EditError> {
        let grid = &mut self.layout.grid;
        if grid.remove_activation_target(source, target) {
            out.push(EditorEvent::FieldDisconnected { source, target });
        } else {
            grid.add_activation_target(source, target)?;
            out.push(EditorEvent::FieldConnected { source, target });
        }
        Ok(())
    }

    fn set_initial_state(&mut self, position: Position, open: bool, out: &mut Vec<EditorEvent>) {
        let Some(field) = self.layout.grid.get_mut(position) else {
            return;
        };
        if field.kind() != FieldKind::Gate || field.initially_open() == open {
            return;
        }
        field.set_initial_state(open);
        out.push(EditorEvent::InitialStateChanged { position, open });
    }

    fn replace_tile(&mut self, position: Position, tile: TileKind, out: &mut Vec<EditorEvent>) {
        if !self.layout.grid.is_interior(position) {
            return;
        }

        let previous = match tile {
            TileKind::Start => self.layout.start.replace(position),
            TileKind::Goal => self.layout.goal.replace(position),
            _ => None,
        };
        if let Some(previous) = previous.filter(|previous| *previous != position) {
            let _ = self
                .layout
                .grid
                .replace(previous, Field::new(FieldKind::Floor, previous));
            out.push(EditorEvent::SpecialFieldRemoved { position: previous });
        }
        if tile != TileKind::Start && self.layout.start == Some(position) {
            self.layout.start = None;
        }
        if tile != TileKind::Goal && self.layout.goal == Some(position) {
            self.layout.goal = None;
        }

        if self.layout.crates.remove(&position) {
            out.push(EditorEvent::CrateRemoved { position });
        }
        let _ = self.layout.grid.replace(position, tile.field(position));
        out.push(EditorEvent::TileReplaced { position });
        if tile == TileKind::Crate {
            let _ = self.layout.crates.insert(position);
            out.push(EditorEvent::CrateAdded { position });
        }
    }

    fn new_map(
        &mut self,
        width: u32,
        height: u32,
        translate: Option<Position>,
        out: &mut Vec<EditorEvent>,
    ) -> Result<(), EditError> {
        check_size(width, height)?;
        let Some(offset) = translate else {
            self.layout = blank_layout(width, height);
            out.push(EditorEvent::MapReplaced { width, height });
            return Ok(());
        };

        let old = std::mem::replace(&mut self.layout, blank_layout(width, height));
        let bounds = FieldGrid::walls(width, height);
        let remap = |position: Position| {
            let moved = position + offset;
            (old.grid.is_interior(position) && bounds.is_interior(moved)).then_some(moved)
        };

        let mut moved: BTreeMap<Position, Field> = BTreeMap::new();
        for field in old.grid.clone().into_fields() {
            if let Some(to) = remap(field.position()) {
                let _ = moved.insert(to, field.relocated(to, remap));
            }
        }
        let fields = FieldGrid::walls(width, height)
            .into_fields()
            .into_iter()
            .map(|wall| moved.remove(&wall.position()).unwrap_or(wall))
            .collect();

        self.layout = LevelLayout {
            name: old.name.clone(),
            grid: FieldGrid::from_rows(width, height, fields),
            start: old.start.and_then(remap),
            goal: old.goal.and_then(remap),
            crates: old.crates.iter().filter_map(|p| remap(*p)).collect(),
            metadata: old.metadata.clone(),
        };
        debug!(width, height, %offset, "map resized");
        out.push(EditorEvent::MapReplaced { width, height });
        Ok(())
    }
}

fn check_size(width: u32, height: u32) -> Result<(), EditError> {
    if width < MIN_SIDE || height < MIN_SIDE {
        return Err(EditError::TooSmall { width, height });
    }
    Ok(())
}

fn blank_layout(width: u32, height: u32) -> LevelLayout {
    LevelLayout {
        name: UNTITLED.to_owned(),
        grid: FieldGrid::walls(width, height),
        start: None,
        goal: None,
        crates: BTreeSet::new(),
        metadata: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(level: &mut EditableLevel, x: i32, y: i32, tile: TileKind) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        level
            .perform_change(
                EditorChange::ReplaceTile {
                    position: Position::new(x, y),
                    tile,
                },
                &mut events,
            )
            .expect("painting never fails");
        events
    }

    fn room() -> EditableLevel {
        let mut level = EditableLevel::new(6, 3).expect("valid size");
        for x in 1..5 {
            let _ = paint(&mut level, x, 1, TileKind::Floor);
        }
        let _ = paint(&mut level, 1, 1, TileKind::Start);
        let _ = paint(&mut level, 4, 1, TileKind::Goal);
        level
    }

    #[test]
    fn new_maps_are_walls() {
        let level = EditableLevel::new(3, 3).expect("valid size");
        assert!(level.layout().grid().iter().all(Field::is_wall));
        assert_eq!(
            EditableLevel::new(2, 5),
            Err(EditError::TooSmall {
                width: 2,
                height: 5
            })
        );
    }

    #[test]
    fn border_tiles_are_ignored() {
        let mut level = room();
        assert!(paint(&mut level, 0, 1, TileKind::Floor).is_empty());
        assert!(level
            .layout()
            .field(Position::new(0, 1))
            .is_some_and(Field::is_wall));
    }

    #[test]
    fn placing_a_second_start_demotes_the_first() {
        let mut level = room();
        let events = paint(&mut level, 2, 1, TileKind::Start);

        assert_eq!(
            events,
            vec![
                EditorEvent::SpecialFieldRemoved {
                    position: Position::new(1, 1)
                },
                EditorEvent::TileReplaced {
                    position: Position::new(2, 1)
                },
            ]
        );
        assert_eq!(level.layout().start_location(), Some(Position::new(2, 1)));
        assert_eq!(
            level.layout().field(Position::new(1, 1)).map(Field::kind),
            Some(FieldKind::Floor)
        );
    }

    #[test]
    fn painting_over_the_goal_clears_it() {
        let mut level = room();
        let _ = paint(&mut level, 4, 1, TileKind::Floor);
        assert_eq!(level.layout().goal_location(), None);
        assert_eq!(level.playable().err(), Some(StructuralError::MissingGoal));
    }

    #[test]
    fn toggling_connections_adds_then_removes() {
        let mut level = room();
        let _ = paint(&mut level, 2, 1, TileKind::Button);
        let _ = paint(&mut level, 3, 1, TileKind::Gate);
        let change = EditorChange::ToggleConnection {
            source: Position::new(2, 1),
            target: Position::new(3, 1),
        };

        let mut events = Vec::new();
        level.perform_change(change, &mut events).expect("connect");
        level.perform_change(change, &mut events).expect("disconnect");
        assert_eq!(
            events,
            vec![
                EditorEvent::FieldConnected {
                    source: Position::new(2, 1),
                    target: Position::new(3, 1)
                },
                EditorEvent::FieldDisconnected {
                    source: Position::new(2, 1),
                    target: Position::new(3, 1)
                },
            ]
        );
    }

    #[test]
    fn connecting_incapable_fields_fails() {
        let mut level = room();
        let mut events = Vec::new();
        let result = level.perform_change(
            EditorChange::ToggleConnection {
                source: Position::new(2, 1),
                target: Position::new(3, 1),
            },
            &mut events,
        );
        assert!(matches!(
            result,
            Err(EditError::Capability(CapabilityError::NotASource { .. }))
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn replacing_a_connected_field_drops_its_edges() {
        let mut level = room();
        let _ = paint(&mut level, 2, 1, TileKind::Button);
        let _ = paint(&mut level, 3, 1, TileKind::Gate);
        let mut events = Vec::new();
        level
            .perform_change(
                EditorChange::ToggleConnection {
                    source: Position::new(2, 1),
                    target: Position::new(3, 1),
                },
                &mut events,
            )
            .expect("connect");

        let _ = paint(&mut level, 3, 1, TileKind::Floor);
        assert!(level
            .layout()
            .field(Position::new(2, 1))
            .is_some_and(|button| button.iter_activation_targets().next().is_none()));
    }

    #[test]
    fn gate_initial_state_is_editable() {
        let mut level = room();
        let _ = paint(&mut level, 3, 1, TileKind::Gate);
        let mut events = Vec::new();
        let close = EditorChange::SetInitialState {
            position: Position::new(3, 1),
            open: false,
        };
        level.perform_change(close, &mut events).expect("close");
        level.perform_change(close, &mut events).expect("already closed");

        assert_eq!(
            events,
            vec![EditorEvent::InitialStateChanged {
                position: Position::new(3, 1),
                open: false
            }]
        );
        assert_eq!(
            level.layout().field(Position::new(3, 1)).map(Field::symbol),
            Some('-')
        );
    }

    #[test]
    fn crates_are_added_and_removed() {
        let mut level = room();
        let events = paint(&mut level, 2, 1, TileKind::Crate);
        assert!(events.contains(&EditorEvent::CrateAdded {
            position: Position::new(2, 1)
        }));

        let events = paint(&mut level, 2, 1, TileKind::Floor);
        assert!(events.contains(&EditorEvent::CrateRemoved {
            position: Position::new(2, 1)
        }));
        assert!(level.layout().crate_positions().is_empty());
    }

    #[test]
    fn translated_resize_keeps_interior_and_edges() {
        let mut level = room();
        let _ = paint(&mut level, 2, 1, TileKind::Button);
        let _ = paint(&mut level, 3, 1, TileKind::Gate);
        let mut events = Vec::new();
        level
            .perform_change(
                EditorChange::ToggleConnection {
                    source: Position::new(2, 1),
                    target: Position::new(3, 1),
                },
                &mut events,
            )
            .expect("connect");

        level
            .perform_change(
                EditorChange::Resize {
                    width: 7,
                    height: 4,
                    translate: Some(Position::new(1, 1)),
                },
                &mut events,
            )
            .expect("resize");

        let layout = level.layout();
        assert_eq!((layout.width(), layout.height()), (7, 4));
        assert_eq!(layout.start_location(), Some(Position::new(2, 2)));
        assert_eq!(layout.goal_location(), Some(Position::new(5, 2)));
        assert!(layout
            .field(Position::new(3, 2))
            .is_some_and(|button| button.has_activation_target(Position::new(4, 2))));
        assert!(layout
            .field(Position::new(1, 1))
            .is_some_and(Field::is_wall));
        assert!(level.playable().is_ok());
    }

    #[test]
    fn edited_level_is_playable_and_serialisable() {
        let mut level = room();
        level.set_metadata("Name", "Room");
        let text = level.to_level_text();
        assert!(text.starts_with("2D SuperFun!\n++++++\n+S  G+\n++++++\n"));
        assert!(text.ends_with("nothing\n\nname: Room\n"));
        assert!(level.playable().is_ok());
    }
}
