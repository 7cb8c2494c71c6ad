//! Player clones and crates.

use std::collections::HashMap;

use chronoshift_core::{CloneId, CrateId, PlayerAction, Position};

/// Incarnation of the player in one loop.
///
/// The action log only ever grows while the clone is the active player;
/// once it enters the time machine it is replayed verbatim in every later
/// loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerClone {
    id: CloneId,
    position: Position,
    actions: Vec<PlayerAction>,
    target: Option<Position>,
}

impl PlayerClone {
    pub(crate) fn new(id: CloneId, position: Position) -> Self {
        Self {
            id,
            position,
            actions: Vec::new(),
            target: None,
        }
    }

    /// Identifier of the loop that created the clone.
    #[must_use]
    pub const fn id(&self) -> CloneId {
        self.id
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Recorded actions in the order they were issued.
    #[must_use]
    pub fn actions(&self) -> &[PlayerAction] {
        &self.actions
    }

    /// Field the clone is moving into during the current tick, if any.
    #[must_use]
    pub const fn target(&self) -> Option<Position> {
        self.target
    }

    /// Action recorded for the provided turn.
    #[must_use]
    pub fn action_at(&self, turn: u32) -> Option<PlayerAction> {
        self.actions.get(turn as usize).copied()
    }

    /// Whether the log ends with the clone stepping into the time machine.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.actions.last() == Some(&PlayerAction::EnterTimeMachine)
    }

    pub(crate) fn record(&mut self, action: PlayerAction) {
        self.actions.push(action);
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub(crate) fn set_target(&mut self, target: Option<Position>) {
        self.target = target;
    }
}

/// Pushable block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Crate {
    id: CrateId,
    position: Position,
}

impl Crate {
    /// Identifier assigned when the level was loaded.
    #[must_use]
    pub const fn id(&self) -> CrateId {
        self.id
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }
}

/// Crates of a running level together with the positions they return to on
/// every rewind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Crates {
    crates: Vec<Crate>,
    origins: Vec<Position>,
    index: HashMap<Position, CrateId>,
}

impl Crates {
    /// Places one crate on each provided position; ids follow iteration order.
    pub(crate) fn new<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Position>,
    {
        let origins: Vec<Position> = positions.into_iter().collect();
        let crates = origins
            .iter()
            .enumerate()
            .map(|(index, position)| Crate {
                id: CrateId::new(index as u32),
                position: *position,
            })
            .collect();
        let mut crates = Self {
            crates,
            origins,
            index: HashMap::new(),
        };
        crates.reindex();
        crates
    }

    /// Crate resting on `position`.
    #[must_use]
    pub fn at(&self, position: Position) -> Option<&Crate> {
        self.index
            .get(&position)
            .and_then(|id| self.crates.get(id.get() as usize))
    }

    /// Crates in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Crate> {
        self.crates.iter()
    }

    /// Number of crates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.crates.len()
    }

    /// Whether the level has no crates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.crates.is_empty()
    }

    /// Positions the crates occupied when the level was loaded.
    #[must_use]
    pub fn original_positions(&self) -> &[Position] {
        &self.origins
    }

    /// Moves a crate, returning the crate it displaced from `to` if any.
    pub(crate) fn relocate(&mut self, id: CrateId, to: Position) -> Option<CrateId> {
        let slot = self.crates.get_mut(id.get() as usize)?;
        let from = slot.position;
        slot.position = to;
        if self.index.get(&from) == Some(&id) {
            let _ = self.index.remove(&from);
        }
        self.index.insert(to, id).filter(|other| *other != id)
    }

    /// Returns every crate to its original position.
    pub(crate) fn restore(&mut self) {
        for (slot, origin) in self.crates.iter_mut().zip(&self.origins) {
            slot.position = *origin;
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .crates
            .iter()
            .map(|slot| (slot.position, slot.id))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocating_updates_lookup() {
        let mut crates = Crates::new([Position::new(1, 1), Position::new(3, 1)]);
        assert_eq!(crates.relocate(CrateId::new(0), Position::new(2, 1)), None);

        assert!(crates.at(Position::new(1, 1)).is_none());
        assert_eq!(
            crates.at(Position::new(2, 1)).map(Crate::id),
            Some(CrateId::new(0))
        );
    }

    #[test]
    fn relocating_onto_another_crate_reports_collision() {
        let mut crates = Crates::new([Position::new(1, 1), Position::new(3, 1)]);
        assert_eq!(
            crates.relocate(CrateId::new(0), Position::new(3, 1)),
            Some(CrateId::new(1))
        );
    }

    #[test]
    fn restore_returns_crates_to_origins() {
        let mut crates = Crates::new([Position::new(1, 1)]);
        let _ = crates.relocate(CrateId::new(0), Position::new(4, 4));
        crates.restore();

        assert_eq!(
            crates.at(Position::new(1, 1)).map(Crate::position),
            Some(Position::new(1, 1))
        );
        assert_eq!(crates.original_positions(), &[Position::new(1, 1)]);
    }

    #[test]
    fn clone_retires_on_time_machine() {
        let mut clone = PlayerClone::new(CloneId::new(0), Position::new(1, 1));
        clone.record(PlayerAction::MoveRight);
        assert!(!clone.is_retired());
        clone.record(PlayerAction::EnterTimeMachine);
        assert!(clone.is_retired());
        assert_eq!(clone.action_at(0), Some(PlayerAction::MoveRight));
        assert_eq!(clone.action_at(2), None);
    }
}
