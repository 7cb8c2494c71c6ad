//! Text format for level files.
//!
//! A level file has four parts: the header line, the grid (terminated by a
//! blank line), the activation rules (terminated by a blank line) and the
//! metadata block. Everything after the metadata block is ignored.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs, io,
    path::{Path, PathBuf},
};

use chronoshift_core::{Position, LEVEL_HEADER};
use thiserror::Error;
use tracing::info;

use crate::{
    field::{CapabilityError, Field, FieldGrid, FieldKind},
    LevelLayout,
};

const RULE_KEYWORD: &str = "button ";
const EMPTY_RULES: &str = "nothing";

/// Structural problems detected while parsing a level file.
///
/// Line numbers are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// The first line is not the level header.
    #[error("bad header {found:?} (expected \"2D SuperFun!\")")]
    BadHeader {
        /// Line found in place of the header.
        found: String,
    },
    /// A line consists of white-space only.
    #[error("line {line}: white-space only line")]
    WhitespaceLine {
        /// Offending line.
        line: usize,
    },
    /// The grid section is empty.
    #[error("level has no grid rows")]
    EmptyGrid,
    /// A grid row differs in width from the first row.
    #[error("line {line}: inconsistent width {found} (expected {expected})")]
    InconsistentWidth {
        /// Offending line.
        line: usize,
        /// Width of the offending row.
        found: usize,
        /// Width of the first row.
        expected: usize,
    },
    /// A grid row does not start and end with a wall.
    #[error("line {line}: wall missing on left or right side")]
    MissingBorder {
        /// Offending line.
        line: usize,
    },
    /// A grid row contains a symbol with no field kind.
    #[error("line {line}: unknown symbol {symbol:?}")]
    UnknownSymbol {
        /// Offending line.
        line: usize,
        /// Unrecognised symbol.
        symbol: char,
    },
    /// More than one start field was found.
    #[error("line {line}: second start location at {position} (first at {first})")]
    DuplicateStart {
        /// Offending line.
        line: usize,
        /// Earlier start field.
        first: Position,
        /// Second start field.
        position: Position,
    },
    /// More than one goal field was found.
    #[error("line {line}: second goal location at {position} (first at {first})")]
    DuplicateGoal {
        /// Offending line.
        line: usize,
        /// Earlier goal field.
        first: Position,
        /// Second goal field.
        position: Position,
    },
    /// The grid has no start field.
    #[error("level has no start location")]
    MissingStart,
    /// The grid has no goal field.
    #[error("level has no goal location")]
    MissingGoal,
    /// A rule line does not begin with a known rule keyword.
    #[error("line {line}: unknown activation rule {found:?}")]
    UnknownRule {
        /// Offending line.
        line: usize,
        /// Text of the offending line.
        found: String,
    },
    /// A button rule could not be parsed.
    #[error("line {line}: cannot parse button rule {found:?}")]
    MalformedRule {
        /// Offending line.
        line: usize,
        /// Text of the offending line.
        found: String,
    },
    /// A button rule names something other than a gate as its target.
    #[error("line {line}: buttons can only activate gates, not {found:?}")]
    UnsupportedTarget {
        /// Offending line.
        line: usize,
        /// Target name used by the rule.
        found: String,
    },
    /// A rule references a field outside the grid.
    #[error("line {line}: {position} is outside the level")]
    RuleOutOfBounds {
        /// Offending line.
        line: usize,
        /// Offending position.
        position: Position,
    },
    /// A rule connects fields that lack the required capability.
    #[error("line {line}: {source}")]
    Capability {
        /// Offending line.
        line: usize,
        /// Underlying capability problem.
        source: CapabilityError,
    },
    /// A continuation line appeared before any metadata key.
    #[error("line {line}: continuation line without a field")]
    OrphanContinuation {
        /// Offending line.
        line: usize,
    },
    /// A continuation line is too short or starts with a bare `.`.
    #[error("line {line}: bad continuation line")]
    BadContinuation {
        /// Offending line.
        line: usize,
    },
    /// A metadata line has no `:` separator.
    #[error("line {line}: missing ':' in metadata line")]
    MissingColon {
        /// Offending line.
        line: usize,
    },
    /// A metadata key contains a space.
    #[error("line {line}: metadata key {key:?} contains a space")]
    BadKey {
        /// Offending line.
        line: usize,
        /// Offending key.
        key: String,
    },
}

/// Failures raised while loading or saving level files.
#[derive(Debug, Error)]
pub enum LevelError {
    /// Reading or writing the file failed.
    #[error("failed to access level file {}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The file content is malformed.
    #[error("{}: {source}", path.display())]
    Structural {
        /// File being parsed.
        path: PathBuf,
        /// Underlying structural problem.
        source: StructuralError,
    },
}

/// Reads and parses the level file at `path`.
pub fn load_layout(path: &Path) -> Result<LevelLayout, LevelError> {
    let text = fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path.display().to_string();
    parse_layout(&name, &text).map_err(|source| LevelError::Structural {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `text` to `path`.
pub fn write_level(path: &Path, text: &str) -> Result<(), LevelError> {
    fs::write(path, text).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses level text into a layout named `name`.
pub fn parse_layout(name: &str, text: &str) -> Result<LevelLayout, StructuralError> {
    let mut lines = text.lines().enumerate().map(|(index, line)| (index + 1, line));

    let header = lines.next().map_or("", |(_, line)| line);
    if header != LEVEL_HEADER {
        return Err(StructuralError::BadHeader {
            found: header.to_owned(),
        });
    }

    let rows = section(&mut lines)?;
    let mut layout = parse_grid(name, &rows)?;
    let rules = section(&mut lines)?;
    parse_rules(&mut layout.grid, &rules)?;
    let metadata = section(&mut lines)?;
    layout.metadata = parse_metadata(&metadata)?;

    info!(
        level = name,
        width = layout.grid.width(),
        height = layout.grid.height(),
        crates = layout.crates.len(),
        "parsed level"
    );
    Ok(layout)
}

/// Renders a layout with crates drawn on the provided positions.
///
/// Rules are written in source position order, then target position order;
/// metadata keys are written sorted.
pub(crate) fn render(layout: &LevelLayout, crates: &BTreeSet<Position>) -> String {
    let grid = &layout.grid;
    let mut text = String::new();
    text.push_str(LEVEL_HEADER);
    text.push('\n');

    for row in grid.iter().collect::<Vec<_>>().chunks(grid.width().max(1) as usize) {
        for field in row {
            if crates.contains(&field.position()) {
                text.push('c');
            } else {
                text.push(field.symbol());
            }
        }
        text.push('\n');
    }
    text.push('\n');

    let mut rules = 0_usize;
    for field in grid.iter_by_position() {
        for target in field.iter_activation_targets() {
            text.push_str(&format!("button {} -> gate {}\n", field.position(), target));
            rules += 1;
        }
    }
    if rules == 0 && !layout.metadata.is_empty() {
        text.push_str(EMPTY_RULES);
        text.push('\n');
    }
    text.push('\n');

    for (key, value) in &layout.metadata {
        text.push_str(&format!("{key}: {value}\n"));
    }
    text
}

fn section<'a, I>(lines: &mut I) -> Result<Vec<(usize, &'a str)>, StructuralError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut collected = Vec::new();
    for (number, line) in lines {
        if line.is_empty() {
            break;
        }
        if line.trim().is_empty() {
            return Err(StructuralError::WhitespaceLine { line: number });
        }
        collected.push((number, line));
    }
    Ok(collected)
}

fn parse_grid(name: &str, rows: &[(usize, &str)]) -> Result<LevelLayout, StructuralError> {
    let Some(&(_, first)) = rows.first() else {
        return Err(StructuralError::EmptyGrid);
    };
    let width = first.chars().count();

    let mut fields = Vec::with_capacity(width * rows.len());
    let mut crates = BTreeSet::new();
    let mut start: Option<Position> = None;
    let mut goal: Option<Position> = None;

    for (y, &(line, row)) in rows.iter().enumerate() {
        let found = row.chars().count();
        if found != width {
            return Err(StructuralError::InconsistentWidth {
                line,
                found,
                expected: width,
            });
        }
        if !row.trim().starts_with('+') || !row.trim().ends_with('+') {
            return Err(StructuralError::MissingBorder { line });
        }

        for (x, symbol) in row.chars().enumerate() {
            let position = Position::new(x as i32, y as i32);
            let field = match symbol {
                '+' => Field::new(FieldKind::Wall, position),
                ' ' => Field::new(FieldKind::Floor, position),
                'c' => {
                    let _ = crates.insert(position);
                    Field::new(FieldKind::Floor, position)
                }
                '-' => Field::gate(position, false),
                '_' => Field::gate(position, true),
                'b' => Field::new(FieldKind::Button, position),
                'o' => Field::new(FieldKind::OneTimeButton, position),
                'p' => Field::new(FieldKind::OneTimePassage, position),
                'P' => Field::new(FieldKind::Pallet, position),
                'S' => {
                    if let Some(first) = start {
                        return Err(StructuralError::DuplicateStart {
                            line,
                            first,
                            position,
                        });
                    }
                    start = Some(position);
                    Field::new(FieldKind::Start, position)
                }
                'G' => {
                    if let Some(first) = goal {
                        return Err(StructuralError::DuplicateGoal {
                            line,
                            first,
                            position,
                        });
                    }
                    goal = Some(position);
                    Field::new(FieldKind::Goal, position)
                }
                symbol => return Err(StructuralError::UnknownSymbol { line, symbol }),
            };
            fields.push(field);
        }
    }

    let start = start.ok_or(StructuralError::MissingStart)?;
    let goal = goal.ok_or(StructuralError::MissingGoal)?;
    Ok(LevelLayout {
        name: name.to_owned(),
        grid: FieldGrid::from_rows(width as u32, rows.len() as u32, fields),
        start: Some(start),
        goal: Some(goal),
        crates,
        metadata: BTreeMap::new(),
    })
}

fn parse_rules(grid: &mut FieldGrid, rules: &[(usize, &str)]) -> Result<(), StructuralError> {
    for &(line, text) in rules {
        if text == EMPTY_RULES {
            continue;
        }
        if !text.starts_with(RULE_KEYWORD) {
            return Err(StructuralError::UnknownRule {
                line,
                found: text.to_owned(),
            });
        }
        let (source, target_name, target) =
            parse_button_rule(text).ok_or_else(|| StructuralError::MalformedRule {
                line,
                found: text.to_owned(),
            })?;
        if target_name != "gate" {
            return Err(StructuralError::UnsupportedTarget {
                line,
                found: target_name.to_owned(),
            });
        }
        for position in [source, target] {
            if !grid.contains(position) {
                return Err(StructuralError::RuleOutOfBounds { line, position });
            }
        }
        grid.add_activation_target(source, target)
            .map_err(|source| StructuralError::Capability { line, source })?;
    }
    Ok(())
}

/// Parses `button (x, y) -> name (x, y)`, tolerating white-space between tokens.
fn parse_button_rule(text: &str) -> Option<(Position, &str, Position)> {
    let mut cursor = RuleCursor {
        rest: text.strip_prefix(RULE_KEYWORD)?,
    };
    cursor.skip_whitespace();
    let source = cursor.position()?;
    cursor.skip_whitespace();
    cursor.literal("->")?;
    cursor.skip_whitespace();
    let name = cursor.word()?;
    cursor.skip_whitespace();
    let target = cursor.position()?;
    cursor.skip_whitespace();
    cursor.rest.is_empty().then_some((source, name, target))
}

struct RuleCursor<'a> {
    rest: &'a str,
}

impl<'a> RuleCursor<'a> {
    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn literal(&mut self, literal: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(literal)?;
        Some(())
    }

    fn word(&mut self) -> Option<&'a str> {
        let end = self
            .rest
            .find(|ch: char| ch.is_whitespace() || ch == '(')
            .unwrap_or(self.rest.len());
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        (!word.is_empty()).then_some(word)
    }

    fn number(&mut self) -> Option<i32> {
        let end = self
            .rest
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        let value = digits.parse().ok()?;
        self.rest = rest;
        Some(value)
    }

    fn position(&mut self) -> Option<Position> {
        self.literal("(")?;
        self.skip_whitespace();
        let x = self.number()?;
        self.skip_whitespace();
        self.literal(",")?;
        self.skip_whitespace();
        let y = self.number()?;
        self.skip_whitespace();
        self.literal(")")?;
        Some(Position::new(x, y))
    }
}

fn parse_metadata(lines: &[(usize, &str)]) -> Result<BTreeMap<String, String>, StructuralError> {
    let mut metadata: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for &(line, text) in lines {
        if text.starts_with(' ') {
            let Some(key) = current.as_ref() else {
                return Err(StructuralError::OrphanContinuation { line });
            };
            let mut chars = text.chars();
            let length = text.chars().count();
            if length == 1 || (chars.nth(1) == Some('.') && length > 2) {
                return Err(StructuralError::BadContinuation { line });
            }
            if let Some(value) = metadata.get_mut(key) {
                value.push('\n');
                value.push_str(text);
            }
            continue;
        }

        let (key, value) = text
            .split_once(':')
            .ok_or(StructuralError::MissingColon { line })?;
        let key = key.to_lowercase();
        if key.contains(' ') {
            return Err(StructuralError::BadKey { line, key });
        }
        let _ = metadata.insert(key.clone(), value.trim().to_owned());
        current = Some(key);
    }
    Ok(metadata)
}
