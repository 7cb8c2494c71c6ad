#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Compact solution scripts stored in level metadata.
//!
//! A script uses one character per action (`N`, `E`, `S`, `W`, `H`, `T`).
//! White-space and `.` are separators and carry no meaning; by convention a
//! `.` marks the start of the next loop.

use std::str::CharIndices;

use chronoshift_core::PlayerAction;
use thiserror::Error;

/// Metadata key holding a level's solution script.
pub const SOLUTION_KEY: &str = "solution";

const LOOP_SEPARATOR: &str = " .";

/// Failures raised while decoding a solution script.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SolutionError {
    /// The script contains a character that is neither an action nor a
    /// separator.
    #[error("unknown solution token {token:?} at offset {offset}")]
    UnknownToken {
        /// Offending character.
        token: char,
        /// Byte offset of the character within the script.
        offset: usize,
    },
}

/// How decoded actions are fed to a consumer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplayMode {
    /// Yield the recorded actions only.
    Exact,
    /// Pad every loop with `skip-turn` actions up to the longest loop seen so
    /// far, so a consumer that ignores replay state still stays turn-aligned.
    #[default]
    Naive,
}

/// Maps a script character to its action.
#[must_use]
pub const fn token_action(token: char) -> Option<PlayerAction> {
    match token {
        'N' => Some(PlayerAction::MoveUp),
        'E' => Some(PlayerAction::MoveRight),
        'S' => Some(PlayerAction::MoveDown),
        'W' => Some(PlayerAction::MoveLeft),
        'H' => Some(PlayerAction::SkipTurn),
        'T' => Some(PlayerAction::EnterTimeMachine),
        _ => None,
    }
}

/// Maps an action to its script character; reset actions have none.
#[must_use]
pub const fn action_token(action: PlayerAction) -> Option<char> {
    match action {
        PlayerAction::MoveUp => Some('N'),
        PlayerAction::MoveRight => Some('E'),
        PlayerAction::MoveDown => Some('S'),
        PlayerAction::MoveLeft => Some('W'),
        PlayerAction::SkipTurn => Some('H'),
        PlayerAction::EnterTimeMachine => Some('T'),
        PlayerAction::ResetTimeJump | PlayerAction::ResetLevel => None,
    }
}

/// Solution script that can be decoded any number of times.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Solution {
    text: String,
}

impl Solution {
    /// Wraps script text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Encodes the action logs of every clone, one loop after another.
    ///
    /// Each action goes on its own line and loops are separated by a `.`
    /// line, so the result can be stored as a multi-line metadata value.
    /// Empty logs are skipped.
    #[must_use]
    pub fn encode<'a, I>(logs: I) -> Self
    where
        I: IntoIterator<Item = &'a [PlayerAction]>,
    {
        let loops: Vec<String> = logs
            .into_iter()
            .filter(|log| !log.is_empty())
            .map(|log| {
                log.iter()
                    .filter_map(|action| action_token(*action))
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .join("\n ")
            })
            .collect();
        Self {
            text: loops.join(&format!("\n{LOOP_SEPARATOR}\n ")),
        }
    }

    /// Script text as stored in metadata.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether the script holds no actions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.text.chars().any(|token| token_action(token).is_some())
    }

    /// Decodes the script from the beginning.
    #[must_use]
    pub fn actions(&self, mode: ReplayMode) -> SolutionActions<'_> {
        SolutionActions {
            tokens: self.text.char_indices(),
            mode,
            loop_length: 0,
            longest_loop: 0,
            padding: 0,
            failed: false,
        }
    }
}

/// Iterator over the actions of a [`Solution`].
///
/// Decoding stops after the first unknown token.
#[derive(Clone, Debug)]
pub struct SolutionActions<'a> {
    tokens: CharIndices<'a>,
    mode: ReplayMode,
    loop_length: usize,
    longest_loop: usize,
    padding: usize,
    failed: bool,
}

impl Iterator for SolutionActions<'_> {
    type Item = Result<PlayerAction, SolutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.padding > 0 {
            self.padding -= 1;
            return Some(Ok(PlayerAction::SkipTurn));
        }
        if self.failed {
            return None;
        }

        let (offset, token) = self
            .tokens
            .by_ref()
            .find(|(_, token)| !token.is_whitespace() && *token != '.')?;
        let Some(action) = token_action(token) else {
            self.failed = true;
            return Some(Err(SolutionError::UnknownToken { token, offset }));
        };

        if self.mode == ReplayMode::Naive {
            self.loop_length += 1;
            if action == PlayerAction::EnterTimeMachine {
                if self.loop_length < self.longest_loop {
                    self.padding = self.longest_loop - self.loop_length;
                } else {
                    self.longest_loop = self.loop_length;
                }
                self.loop_length = 0;
            }
        }
        Some(Ok(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoshift_core::PlayerAction::{EnterTimeMachine, MoveLeft, MoveRight, SkipTurn};

    fn decode(text: &str, mode: ReplayMode) -> Vec<PlayerAction> {
        Solution::new(text)
            .actions(mode)
            .collect::<Result<_, _>>()
            .expect("valid script")
    }

    #[test]
    fn separators_are_ignored() {
        assert_eq!(
            decode(" E\n W.\tT ", ReplayMode::Exact),
            vec![MoveRight, MoveLeft, EnterTimeMachine]
        );
    }

    #[test]
    fn naive_replay_pads_short_loops() {
        let actions = decode("EEWWT . T . ET", ReplayMode::Naive);
        assert_eq!(
            actions,
            vec![
                MoveRight,
                MoveRight,
                MoveLeft,
                MoveLeft,
                EnterTimeMachine,
                EnterTimeMachine,
                SkipTurn,
                SkipTurn,
                SkipTurn,
                SkipTurn,
                MoveRight,
                EnterTimeMachine,
                SkipTurn,
                SkipTurn,
                SkipTurn,
            ]
        );
    }

    #[test]
    fn unknown_tokens_stop_decoding() {
        let solution = Solution::new("E x W");
        let decoded: Vec<_> = solution.actions(ReplayMode::Exact).collect();
        assert_eq!(
            decoded,
            vec![
                Ok(MoveRight),
                Err(SolutionError::UnknownToken {
                    token: 'x',
                    offset: 2
                }),
            ]
        );
    }

    #[test]
    fn decoding_restarts_from_the_beginning() {
        let solution = Solution::new("HT");
        let first: Vec<_> = solution.actions(ReplayMode::Exact).collect();
        let second: Vec<_> = solution.actions(ReplayMode::Exact).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn encoding_writes_one_action_per_line() {
        let first = [MoveRight, EnterTimeMachine];
        let second = [SkipTurn, EnterTimeMachine];
        let solution = Solution::encode([&first[..], &second[..], &[][..]]);

        assert_eq!(solution.as_str(), "E\n T\n .\n H\n T");
        assert_eq!(
            decode(solution.as_str(), ReplayMode::Exact),
            vec![MoveRight, EnterTimeMachine, SkipTurn, EnterTimeMachine]
        );
    }

    #[test]
    fn empty_scripts_are_detected() {
        assert!(Solution::new(" . \n").is_empty());
        assert!(!Solution::new(" H").is_empty());
    }
}
