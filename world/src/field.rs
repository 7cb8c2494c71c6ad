//! Grid fields and the activation graph that connects them.
//!
//! Fields live in a dense arena ([`FieldGrid`]) addressed by position. Edges
//! of the activation graph are stored on both ends as position sets, so a
//! source knows its targets and a target knows its sources without any
//! ownership cycle. Every mutation goes through the grid, which keeps the
//! two halves of each edge in sync.

use std::collections::BTreeSet;

use chronoshift_core::Position;
use thiserror::Error;

/// Variants of grid fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Plain walkable floor.
    Floor,
    /// Impassable wall.
    Wall,
    /// Gate that opens and closes when its sources toggle.
    Gate,
    /// Pressure plate that is active while something stands on it.
    Button,
    /// Pressure plate that activates on the first step and then stays active.
    OneTimeButton,
    /// Floor that activates one tick after it is first stepped on.
    OneTimePassage,
    /// Plate that is active exactly while a crate rests on it.
    Pallet,
    /// Start field holding the time machine.
    Start,
    /// Goal field.
    Goal,
}

impl FieldKind {
    /// Reports whether fields of this kind may hold outgoing activation edges.
    #[must_use]
    pub const fn is_activation_source(self) -> bool {
        matches!(
            self,
            Self::Button | Self::OneTimeButton | Self::OneTimePassage | Self::Pallet
        )
    }

    /// Reports whether fields of this kind may hold incoming activation edges.
    #[must_use]
    pub const fn is_activation_target(self) -> bool {
        matches!(self, Self::Gate)
    }
}

/// Inputs that drive a field's activation state during resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stimulus {
    /// An occupant arrived on the field this tick.
    Entered,
    /// The last occupant left the field this tick.
    Left,
    /// Whether a crate rests on the field once the tick's pushes are applied.
    CrateOccupancy(bool),
    /// One tick passed since the field was armed.
    Matured,
    /// The loop is being rewound.
    Reset,
}

/// Single grid cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    kind: FieldKind,
    position: Position,
    activated: bool,
    open: bool,
    initially_open: bool,
    armed: bool,
    targets: BTreeSet<Position>,
    sources: BTreeSet<Position>,
}

impl Field {
    /// Creates a field of the provided kind. Gates start closed.
    #[must_use]
    pub fn new(kind: FieldKind, position: Position) -> Self {
        Self {
            kind,
            position,
            activated: false,
            open: false,
            initially_open: false,
            armed: false,
            targets: BTreeSet::new(),
            sources: BTreeSet::new(),
        }
    }

    /// Creates a gate with the provided initial state.
    #[must_use]
    pub fn gate(position: Position, open: bool) -> Self {
        let mut field = Self::new(FieldKind::Gate, position);
        field.open = open;
        field.initially_open = open;
        field
    }

    /// Variant of the field.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Position assigned when the field was placed in the grid.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Symbol used when the level is written back to disk.
    ///
    /// Gates report their initial state here; see [`Field::display_symbol`]
    /// for the current one.
    #[must_use]
    pub const fn symbol(&self) -> char {
        match self.kind {
            FieldKind::Floor => ' ',
            FieldKind::Wall => '+',
            FieldKind::Gate if self.initially_open => '_',
            FieldKind::Gate => '-',
            FieldKind::Button => 'b',
            FieldKind::OneTimeButton => 'o',
            FieldKind::OneTimePassage => 'p',
            FieldKind::Pallet => 'P',
            FieldKind::Start => 'S',
            FieldKind::Goal => 'G',
        }
    }

    /// Symbol reflecting the current state of the field.
    #[must_use]
    pub const fn display_symbol(&self) -> char {
        match self.kind {
            FieldKind::Gate if self.open => '_',
            FieldKind::Gate => '-',
            _ => self.symbol(),
        }
    }

    /// Whether the field is currently active.
    #[must_use]
    pub const fn activated(&self) -> bool {
        self.activated
    }

    /// Whether moveables may currently stand on the field.
    #[must_use]
    pub const fn can_enter(&self) -> bool {
        match self.kind {
            FieldKind::Wall => false,
            FieldKind::Gate => self.open,
            _ => true,
        }
    }

    /// Whether the field is a wall.
    #[must_use]
    pub const fn is_wall(&self) -> bool {
        matches!(self.kind, FieldKind::Wall)
    }

    /// Whether the gate starts open; `false` for every other kind.
    #[must_use]
    pub const fn initially_open(&self) -> bool {
        self.initially_open
    }

    /// Whether the field may hold outgoing activation edges.
    #[must_use]
    pub const fn is_activation_source(&self) -> bool {
        self.kind.is_activation_source()
    }

    /// Whether the field may hold incoming activation edges.
    #[must_use]
    pub const fn is_activation_target(&self) -> bool {
        self.kind.is_activation_target()
    }

    /// Whether a one-time passage was stepped on and will activate next tick.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Targets of this field in position order.
    pub fn iter_activation_targets(&self) -> impl Iterator<Item = Position> + '_ {
        self.targets.iter().copied()
    }

    /// Sources of this field in position order.
    pub fn iter_activation_sources(&self) -> impl Iterator<Item = Position> + '_ {
        self.sources.iter().copied()
    }

    /// Reports whether an edge to `target` exists.
    #[must_use]
    pub fn has_activation_target(&self, target: Position) -> bool {
        self.targets.contains(&target)
    }

    /// Flips the activation state according to the field's variant.
    ///
    /// Returns whether `activated` changed. Targets are never touched here;
    /// the level batches target updates so that simultaneous sources cancel
    /// out in pairs.
    #[must_use]
    pub fn toggle_activation(&mut self) -> bool {
        match self.kind {
            FieldKind::OneTimeButton | FieldKind::OneTimePassage => {
                if self.activated {
                    return false;
                }
                self.activated = true;
                self.armed = false;
                true
            }
            FieldKind::Gate => {
                self.activated = !self.activated;
                self.open = !self.open;
                true
            }
            _ => {
                self.activated = !self.activated;
                true
            }
        }
    }

    /// Restores the state the field had when the level was loaded.
    ///
    /// Returns whether `activated` changed.
    #[must_use]
    pub fn reset_to_init_state(&mut self) -> bool {
        let changed = self.activated;
        self.activated = false;
        self.armed = false;
        self.open = self.initially_open;
        changed
    }

    pub(crate) fn respond(&mut self, stimulus: Stimulus) -> bool {
        match (self.kind, stimulus) {
            (_, Stimulus::Reset) => self.reset_to_init_state(),
            (FieldKind::Pallet, Stimulus::CrateOccupancy(present)) => {
                present != self.activated && self.toggle_activation()
            }
            (FieldKind::Pallet, _) => false,
            (FieldKind::OneTimePassage, Stimulus::Entered) => {
                if !self.activated {
                    self.armed = true;
                }
                false
            }
            (FieldKind::OneTimePassage, Stimulus::Matured) => {
                self.armed && self.toggle_activation()
            }
            (FieldKind::OneTimePassage, _) => false,
            (_, Stimulus::Entered | Stimulus::Left) => self.toggle_activation(),
            (_, Stimulus::CrateOccupancy(_) | Stimulus::Matured) => false,
        }
    }

    pub(crate) fn set_initial_state(&mut self, open: bool) {
        self.initially_open = open;
        self.open = open;
        self.activated = false;
    }

    /// Moves the field to `to`, remapping its edges and dropping the ones whose
    /// other end has no new position.
    pub(crate) fn relocated<F>(mut self, to: Position, remap: F) -> Self
    where
        F: Fn(Position) -> Option<Position>,
    {
        self.position = to;
        self.targets = self.targets.iter().filter_map(|p| remap(*p)).collect();
        self.sources = self.sources.iter().filter_map(|p| remap(*p)).collect();
        self
    }
}

/// Errors raised when connecting fields that lack the required capability.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The field cannot hold outgoing activation edges.
    #[error("{symbol:?} at {position} is not an activation source")]
    NotASource {
        /// Offending field.
        position: Position,
        /// Symbol of the offending field.
        symbol: char,
    },
    /// The field cannot hold incoming activation edges.
    #[error("{symbol:?} at {position} is not an activation target")]
    NotATarget {
        /// Offending field.
        position: Position,
        /// Symbol of the offending field.
        symbol: char,
    },
    /// The position lies outside the grid.
    #[error("{position} is outside the level")]
    OutOfBounds {
        /// Offending position.
        position: Position,
    },
}

/// Dense row-major arena owning every field of a level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldGrid {
    width: u32,
    height: u32,
    fields: Vec<Field>,
}

impl FieldGrid {
    /// Creates a grid filled with walls.
    #[must_use]
    pub fn walls(width: u32, height: u32) -> Self {
        let mut fields = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                fields.push(Field::new(FieldKind::Wall, to_position(x, y)));
            }
        }
        Self {
            width,
            height,
            fields,
        }
    }

    /// Builds a grid from row-major fields. Positions are reassigned to match
    /// the slot each field occupies.
    pub(crate) fn from_rows(width: u32, height: u32, fields: Vec<Field>) -> Self {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(index, mut field)| {
                let index = index as u32;
                field.position = to_position(index % width.max(1), index / width.max(1));
                field
            })
            .collect();
        Self {
            width,
            height,
            fields,
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the position lies inside the grid.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.index(position).is_some()
    }

    /// Reports whether the position lies strictly inside the outer border.
    #[must_use]
    pub fn is_interior(&self, position: Position) -> bool {
        let (x, y) = (i64::from(position.x()), i64::from(position.y()));
        x > 0 && y > 0 && x < i64::from(self.width) - 1 && y < i64::from(self.height) - 1
    }

    /// Field stored at `position`.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<&Field> {
        self.index(position).map(|index| &self.fields[index])
    }

    pub(crate) fn get_mut(&mut self, position: Position) -> Option<&mut Field> {
        self.index(position).map(move |index| &mut self.fields[index])
    }

    /// Whether a moveable may stand on `position`; positions outside the grid
    /// can never be entered.
    #[must_use]
    pub fn can_enter(&self, position: Position) -> bool {
        self.get(position).is_some_and(Field::can_enter)
    }

    /// Fields in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Fields in position order (column first, then row).
    pub fn iter_by_position(&self) -> impl Iterator<Item = &Field> {
        let height = self.height as usize;
        let width = self.width as usize;
        (0..width).flat_map(move |x| (0..height).map(move |y| &self.fields[y * width + x]))
    }

    /// Positions of every activation source in position order.
    #[must_use]
    pub fn activation_sources(&self) -> Vec<Position> {
        self.iter_by_position()
            .filter(|field| field.is_activation_source())
            .map(Field::position)
            .collect()
    }

    /// Connects `source` to `target`, mirroring the edge on both fields.
    pub fn add_activation_target(
        &mut self,
        source: Position,
        target: Position,
    ) -> Result<(), CapabilityError> {
        let source_field = self
            .get(source)
            .ok_or(CapabilityError::OutOfBounds { position: source })?;
        if !source_field.is_activation_source() {
            return Err(CapabilityError::NotASource {
                position: source,
                symbol: source_field.symbol(),
            });
        }
        let target_field = self
            .get(target)
            .ok_or(CapabilityError::OutOfBounds { position: target })?;
        if !target_field.is_activation_target() {
            return Err(CapabilityError::NotATarget {
                position: target,
                symbol: target_field.symbol(),
            });
        }

        if let Some(field) = self.get_mut(source) {
            let _ = field.targets.insert(target);
        }
        if let Some(field) = self.get_mut(target) {
            let _ = field.sources.insert(source);
        }
        Ok(())
    }

    /// Disconnects `source` from `target`.
    ///
    /// Removing an edge that does not exist is a no-op. Returns whether an
    /// edge was removed.
    pub fn remove_activation_target(&mut self, source: Position, target: Position) -> bool {
        let removed = self
            .get_mut(source)
            .is_some_and(|field| field.targets.remove(&target));
        let mirrored = self
            .get_mut(target)
            .is_some_and(|field| field.sources.remove(&source));
        removed || mirrored
    }

    /// Replaces the field at `position`, detaching every edge that touched the
    /// previous field. Returns the previous field.
    pub(crate) fn replace(&mut self, position: Position, mut field: Field) -> Option<Field> {
        let index = self.index(position)?;
        let old = &self.fields[index];
        let targets: Vec<Position> = old.iter_activation_targets().collect();
        let sources: Vec<Position> = old.iter_activation_sources().collect();
        for target in targets {
            let _ = self.remove_activation_target(position, target);
        }
        for source in sources {
            let _ = self.remove_activation_target(source, position);
        }
        field.position = position;
        field.targets.clear();
        field.sources.clear();
        Some(std::mem::replace(&mut self.fields[index], field))
    }

    /// Consumes the grid, yielding its fields in row-major order.
    pub(crate) fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    fn index(&self, position: Position) -> Option<usize> {
        let x = u32::try_from(position.x()).ok()?;
        let y = u32::try_from(position.y()).ok()?;
        if x < self.width && y < self.height {
            let width = usize::try_from(self.width).ok()?;
            Some(y as usize * width + x as usize)
        } else {
            None
        }
    }
}

fn to_position(x: u32, y: u32) -> Position {
    Position::new(x as i32, y as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> FieldGrid {
        let row = [
            Field::new(FieldKind::Button, Position::default()),
            Field::new(FieldKind::Floor, Position::default()),
            Field::gate(Position::default(), false),
            Field::new(FieldKind::Button, Position::default()),
            Field::gate(Position::default(), true),
        ];
        FieldGrid::from_rows(5, 1, row.to_vec())
    }

    #[test]
    fn edges_are_mirrored_on_both_ends() {
        let mut grid = corridor();
        grid.add_activation_target(Position::new(0, 0), Position::new(2, 0))
            .expect("button drives gate");

        let button = grid.get(Position::new(0, 0)).expect("button");
        let gate = grid.get(Position::new(2, 0)).expect("gate");
        assert!(button.has_activation_target(Position::new(2, 0)));
        assert_eq!(
            gate.iter_activation_sources().collect::<Vec<_>>(),
            vec![Position::new(0, 0)]
        );
    }

    #[test]
    fn connecting_requires_source_and_target_capability() {
        let mut grid = corridor();
        assert_eq!(
            grid.add_activation_target(Position::new(1, 0), Position::new(2, 0)),
            Err(CapabilityError::NotASource {
                position: Position::new(1, 0),
                symbol: ' ',
            })
        );
        assert_eq!(
            grid.add_activation_target(Position::new(0, 0), Position::new(3, 0)),
            Err(CapabilityError::NotATarget {
                position: Position::new(3, 0),
                symbol: 'b',
            })
        );
        assert!(grid
            .get(Position::new(0, 0))
            .expect("button")
            .iter_activation_targets()
            .next()
            .is_none());
    }

    #[test]
    fn removing_missing_edge_is_a_no_op() {
        let mut grid = corridor();
        assert!(!grid.remove_activation_target(Position::new(0, 0), Position::new(2, 0)));

        grid.add_activation_target(Position::new(0, 0), Position::new(2, 0))
            .expect("connect");
        assert!(grid.remove_activation_target(Position::new(0, 0), Position::new(2, 0)));
        assert!(grid
            .get(Position::new(2, 0))
            .expect("gate")
            .iter_activation_sources()
            .next()
            .is_none());
    }

    #[test]
    fn targets_iterate_in_position_order() {
        let mut grid = corridor();
        grid.add_activation_target(Position::new(3, 0), Position::new(4, 0))
            .expect("connect far gate");
        grid.add_activation_target(Position::new(3, 0), Position::new(2, 0))
            .expect("connect near gate");

        let targets: Vec<_> = grid
            .get(Position::new(3, 0))
            .expect("button")
            .iter_activation_targets()
            .collect();
        assert_eq!(targets, vec![Position::new(2, 0), Position::new(4, 0)]);
    }

    #[test]
    fn gate_toggle_flips_passability_and_symbol() {
        let mut gate = Field::gate(Position::new(1, 1), false);
        assert!(!gate.can_enter());
        assert!(gate.toggle_activation());
        assert!(gate.can_enter());
        assert_eq!(gate.display_symbol(), '_');
        assert_eq!(gate.symbol(), '-');
        assert!(gate.reset_to_init_state());
        assert!(!gate.can_enter());
    }

    #[test]
    fn one_time_button_toggles_once() {
        let mut button = Field::new(FieldKind::OneTimeButton, Position::new(1, 1));
        assert!(button.respond(Stimulus::Entered));
        assert!(!button.respond(Stimulus::Left));
        assert!(!button.respond(Stimulus::Entered));
        assert!(button.activated());
        assert!(button.reset_to_init_state());
        assert!(!button.activated());
    }

    #[test]
    fn passage_activates_one_tick_after_step() {
        let mut passage = Field::new(FieldKind::OneTimePassage, Position::new(1, 1));
        assert!(!passage.respond(Stimulus::Entered));
        assert!(passage.is_armed());
        assert!(!passage.activated());
        assert!(passage.respond(Stimulus::Matured));
        assert!(passage.activated());
        assert!(!passage.respond(Stimulus::Entered));
        assert!(!passage.respond(Stimulus::Matured));
        assert!(passage.can_enter());
    }

    #[test]
    fn pallet_follows_crate_occupancy_only() {
        let mut pallet = Field::new(FieldKind::Pallet, Position::new(1, 1));
        assert!(!pallet.respond(Stimulus::Entered));
        assert!(!pallet.respond(Stimulus::CrateOccupancy(false)));
        assert!(pallet.respond(Stimulus::CrateOccupancy(true)));
        assert!(pallet.activated());
        assert!(!pallet.respond(Stimulus::CrateOccupancy(true)));
        assert!(pallet.respond(Stimulus::CrateOccupancy(false)));
        assert!(!pallet.activated());
    }

    #[test]
    fn replacing_a_field_detaches_its_edges() {
        let mut grid = corridor();
        grid.add_activation_target(Position::new(0, 0), Position::new(2, 0))
            .expect("connect");
        let old = grid
            .replace(
                Position::new(2, 0),
                Field::new(FieldKind::Floor, Position::default()),
            )
            .expect("in bounds");

        assert_eq!(old.kind(), FieldKind::Gate);
        assert!(grid
            .get(Position::new(0, 0))
            .expect("button")
            .iter_activation_targets()
            .next()
            .is_none());
        assert_eq!(
            grid.get(Position::new(2, 0)).expect("floor").position(),
            Position::new(2, 0)
        );
    }

    #[test]
    fn positions_outside_the_grid_cannot_be_entered() {
        let grid = corridor();
        assert!(!grid.can_enter(Position::new(-1, 0)));
        assert!(!grid.can_enter(Position::new(0, 1)));
        assert!(grid.can_enter(Position::new(1, 0)));
    }
}
