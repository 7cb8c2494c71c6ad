//! Turn resolution.
//!
//! Every clone acts simultaneously: movement is planned against the board
//! as it was at the start of the tick, activation changes are propagated in
//! one batch, and only then are the planned moves carried out. Consistency
//! checks run last and turn any contradiction into a time paradox.

use std::collections::{BTreeSet, HashSet};

use chronoshift_core::{
    Actor, CloneId, CrateId, Direction, Event, ParadoxReason, PlayerAction, Position,
};
use tracing::{debug, info, warn};

use crate::{
    field::Stimulus,
    moveable::PlayerClone,
    GameState, Level,
};

/// Result of a successfully resolved tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TurnOutcome {
    Continued,
    TimeJump,
    Complete,
}

/// Deferred effect of a planned action, executed after activation changes.
#[derive(Clone, Debug)]
enum Effect {
    Announce(Event),
    Walk {
        clone: usize,
        action: PlayerAction,
        to: Position,
    },
    Push {
        clone: usize,
        action: PlayerAction,
        to: Position,
        crate_id: CrateId,
        crate_to: Position,
    },
}

/// Occupancy changes planned for the tick.
#[derive(Debug, Default)]
struct Occupancy {
    entered: BTreeSet<Position>,
    left: BTreeSet<Position>,
    unchanged: BTreeSet<Position>,
}

impl Occupancy {
    fn activated(&self) -> impl Iterator<Item = Position> + '_ {
        self.entered
            .iter()
            .filter(|p| !self.left.contains(p) && !self.unchanged.contains(p))
            .copied()
    }

    fn deactivated(&self) -> impl Iterator<Item = Position> + '_ {
        self.left
            .iter()
            .filter(|p| !self.entered.contains(p) && !self.unchanged.contains(p))
            .copied()
    }
}

impl Level {
    /// Puts the level back to the beginning of the first loop and spawns
    /// clone 0.
    pub(crate) fn restart(&mut self, out: &mut Vec<Event>) {
        let mut discarded = Vec::new();
        self.rewind(false, &mut discarded);
        self.clones.clear();
        self.score = 0;
        self.turn_no = 0;
        self.turn_max = 0;
        self.got_goal = false;
        self.spawn_clone(out);
        debug!(level = self.name(), "level started");
    }

    /// Resolves one player action, appending the resulting events to `out`.
    pub(crate) fn play(&mut self, action: PlayerAction, out: &mut Vec<Event>) {
        if action.is_reset() {
            self.reset(action, out);
            return;
        }

        match self.state {
            GameState::Idle | GameState::Complete | GameState::Paradox(_) => return,
            GameState::Running => {
                if let Some(clone) = self.clones.last_mut() {
                    clone.record(action);
                }
            }
            GameState::Replaying => {}
        }

        match self.end_of_turn(out) {
            Ok(TurnOutcome::Continued) => {}
            Ok(TurnOutcome::TimeJump) => {
                info!(clones = self.clones.len(), score = self.score, "time jump");
            }
            Ok(TurnOutcome::Complete) => {
                info!(level = self.name(), score = self.score, "level complete");
            }
            Err(reason) => {
                warn!(level = self.name(), %reason, "time paradox");
                out.push(Event::TimeParadox {
                    reason: reason.clone(),
                });
                self.state = GameState::Paradox(reason);
            }
        }
    }

    fn end_of_turn(&mut self, out: &mut Vec<Event>) -> Result<TurnOutcome, ParadoxReason> {
        let turn = self.turn_no;
        let occupied: HashSet<Position> = self.clones.iter().map(PlayerClone::position).collect();
        let mut occupancy = Occupancy::default();
        let mut queue = Vec::new();
        let mut pushes = Vec::new();

        for index in 0..self.clones.len() {
            self.clones[index].set_target(None);
            let clone = &self.clones[index];
            let Some(action) = clone.action_at(turn) else {
                continue;
            };
            let (id, position) = (clone.id(), clone.position());

            match (action, action.direction()) {
                (PlayerAction::EnterTimeMachine, _) => {
                    if position != self.start {
                        return Err(ParadoxReason::CloneNotAtStart {
                            clone: id,
                            position,
                        });
                    }
                    queue.push(Effect::Announce(Event::CloneEnteredTimeMachine { clone: id }));
                }
                (_, Some(direction)) if direction != Direction::NoAct => {
                    let effect = self.plan_move(index, action, direction, &occupied);
                    match &effect {
                        Effect::Walk { to, .. } => {
                            let _ = occupancy.entered.insert(*to);
                            let _ = occupancy.left.insert(position);
                            self.clones[index].set_target(Some(*to));
                        }
                        Effect::Push { to, crate_to, .. } => {
                            let _ = occupancy.entered.insert(*crate_to);
                            let _ = occupancy.unchanged.insert(*to);
                            let _ = occupancy.left.insert(position);
                            pushes.push((*to, *crate_to));
                            self.clones[index].set_target(Some(*to));
                        }
                        Effect::Announce(_) => {
                            let _ = occupancy.unchanged.insert(position);
                        }
                    }
                    queue.push(effect);
                }
                _ => {
                    let _ = occupancy.unchanged.insert(position);
                    queue.push(Effect::Announce(Event::CloneWaited {
                        clone: id,
                        position,
                    }));
                }
            }
        }

        let mut changes: Vec<(Position, Stimulus)> = self
            .layout
            .grid
            .iter_by_position()
            .filter(|field| field.is_armed())
            .map(|field| (field.position(), Stimulus::Matured))
            .collect();
        changes.extend(occupancy.deactivated().map(|p| (p, Stimulus::Left)));
        changes.extend(occupancy.activated().map(|p| (p, Stimulus::Entered)));
        for (from, to) in &pushes {
            changes.push((*from, Stimulus::CrateOccupancy(false)));
            changes.push((*to, Stimulus::CrateOccupancy(true)));
        }
        self.propagate(changes, out);

        let mut pushed = HashSet::new();
        for effect in queue {
            match effect {
                Effect::Announce(event) => out.push(event),
                Effect::Walk { clone, action, to } => self.walk(clone, action, to, out),
                Effect::Push {
                    clone,
                    action,
                    to,
                    crate_id,
                    crate_to,
                } => {
                    if !pushed.insert(crate_id) {
                        return Err(ParadoxReason::CrateMovedTwice { position: to });
                    }
                    if self.crates.relocate(crate_id, crate_to).is_some() {
                        return Err(ParadoxReason::CratesCollided { position: crate_to });
                    }
                    out.push(Event::CratePushed {
                        crate_id,
                        from: to,
                        to: crate_to,
                    });
                    self.walk(clone, action, to, out);
                }
            }
        }

        self.check_consistency()?;

        if !self.got_goal && occupancy.entered.contains(&self.goal) {
            self.got_goal = true;
            out.push(Event::GoalObtained);
        }

        if self.state == GameState::Running {
            self.score += 1;
            if self.clones.last().is_some_and(PlayerClone::is_retired) {
                self.state = GameState::Replaying;
            }
        }

        if self.state == GameState::Running || self.turn_no < self.turn_max {
            self.turn_no += 1;
            self.turn_max = self.turn_max.max(self.turn_no);
            out.push(Event::EndOfTurn { turn: self.turn_no });
            return Ok(TurnOutcome::Continued);
        }

        if self.got_goal {
            self.state = GameState::Complete;
            out.push(Event::GameComplete { score: self.score });
            return Ok(TurnOutcome::Complete);
        }

        self.turn_no = 0;
        self.score += 1;
        out.push(Event::EndOfTurn { turn: 0 });
        self.rewind(false, out);
        out.push(Event::TimeJump);
        self.spawn_clone(out);
        Ok(TurnOutcome::TimeJump)
    }

    /// Plans a move of the clone at `index` against the board as it was at
    /// the start of the tick. Returns a blocked announcement if the move is
    /// impossible.
    fn plan_move(
        &self,
        index: usize,
        action: PlayerAction,
        direction: Direction,
        occupied: &HashSet<Position>,
    ) -> Effect {
        let clone = &self.clones[index];
        let position = clone.position();
        let to = position.moved(direction);
        let blocked = Effect::Announce(Event::CloneBlocked {
            clone: clone.id(),
            action,
            position,
        });

        if !self.layout.grid.can_enter(to) {
            return blocked;
        }
        let Some(pushed) = self.crates.at(to) else {
            return Effect::Walk {
                clone: index,
                action,
                to,
            };
        };

        let crate_to = to.moved(direction);
        if !self.layout.grid.can_enter(crate_to)
            || self.crates.at(crate_to).is_some()
            || occupied.contains(&crate_to)
        {
            return blocked;
        }
        Effect::Push {
            clone: index,
            action,
            to,
            crate_id: pushed.id(),
            crate_to,
        }
    }

    fn walk(&mut self, index: usize, action: PlayerAction, to: Position, out: &mut Vec<Event>) {
        let clone = &mut self.clones[index];
        let from = clone.position();
        clone.set_position(to);
        out.push(Event::CloneMoved {
            clone: clone.id(),
            action,
            from,
            to,
        });
    }

    fn check_consistency(&self) -> Result<(), ParadoxReason> {
        for clone in &self.clones {
            let position = clone.position();
            if self.crates.at(position).is_some() {
                return Err(ParadoxReason::CloneUnderCrate { position });
            }
            if !self.layout.grid.can_enter(position) {
                return Err(ParadoxReason::CloneOnUnreachableField { position });
            }
        }
        for placed in self.crates.iter() {
            if !self.layout.grid.can_enter(placed.position()) {
                return Err(ParadoxReason::CrateOnUnreachableField {
                    position: placed.position(),
                });
            }
        }
        Ok(())
    }

    /// Feeds stimuli to activation sources and flips their targets.
    ///
    /// Targets of every source that changed are collected into one set where
    /// a second toggle of the same target cancels the first; the surviving
    /// targets are toggled once at the end.
    fn propagate(&mut self, changes: Vec<(Position, Stimulus)>, out: &mut Vec<Event>) {
        let mut flipped = BTreeSet::new();
        for (position, stimulus) in changes {
            let Some(field) = self.layout.grid.get_mut(position) else {
                continue;
            };
            if !field.is_activation_source() || !field.respond(stimulus) {
                continue;
            }
            out.push(activation_event(field.position(), field.activated()));
            for target in field.iter_activation_targets() {
                if !flipped.remove(&target) {
                    let _ = flipped.insert(target);
                }
            }
        }

        for target in flipped {
            if let Some(field) = self.layout.grid.get_mut(target) {
                let _ = field.toggle_activation();
                out.push(activation_event(target, field.activated()));
            }
        }
    }

    /// Returns sources, crates and optionally clones to their initial state.
    fn rewind(&mut self, clones: bool, out: &mut Vec<Event>) {
        let changes = self
            .sources
            .iter()
            .map(|position| (*position, Stimulus::Reset))
            .collect();
        self.propagate(changes, out);

        self.crates.restore();
        for placed in self.crates.iter() {
            out.push(Event::MoveableJumped {
                actor: Actor::Crate(placed.id()),
                to: placed.position(),
            });
        }

        if clones {
            for clone in &mut self.clones {
                clone.set_position(self.start);
                clone.set_target(None);
                out.push(Event::MoveableJumped {
                    actor: Actor::Clone(clone.id()),
                    to: self.start,
                });
            }
        }
    }

    fn reset(&mut self, action: PlayerAction, out: &mut Vec<Event>) {
        if self.state == GameState::Idle {
            return;
        }

        self.rewind(true, out);
        self.turn_no = 0;
        match action {
            PlayerAction::ResetTimeJump => {
                if let Some(clone) = self.clones.pop() {
                    out.push(Event::CloneRemoved { clone: clone.id() });
                }
            }
            _ => {
                for clone in self.clones.drain(..) {
                    out.push(Event::CloneRemoved { clone: clone.id() });
                }
            }
        }

        self.score = self
            .clones
            .iter()
            .map(|clone| clone.actions().len() as u32 + 1)
            .sum();
        self.turn_max = self
            .clones
            .iter()
            .map(|clone| clone.actions().len() as u32)
            .max()
            .map_or(0, |longest| longest.saturating_sub(1));
        if self.got_goal {
            self.got_goal = false;
            out.push(Event::GoalLost);
        }

        debug!(
            level = self.name(),
            %action,
            clones = self.clones.len(),
            score = self.score,
            "level reset"
        );
        self.spawn_clone(out);
    }

    fn spawn_clone(&mut self, out: &mut Vec<Event>) {
        let id = CloneId::new(self.clones.len() as u32);
        self.clones.push(PlayerClone::new(id, self.start));
        self.state = GameState::Running;
        out.push(Event::CloneAdded {
            clone: id,
            position: self.start,
        });
    }
}

fn activation_event(position: Position, activated: bool) -> Event {
    if activated {
        Event::FieldActivated { position }
    } else {
        Event::FieldDeactivated { position }
    }
}
