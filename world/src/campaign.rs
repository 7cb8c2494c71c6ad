//! Campaign files: an ordered list of level files.
//!
//! The first line is the campaign header. Every following non-empty line
//! that does not start with `#` names a level file relative to the
//! directory holding the campaign file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chronoshift_core::CAMPAIGN_HEADER;
use thiserror::Error;
use tracing::debug;

/// Failures raised while reading or writing campaign files.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Reading or writing the campaign file failed.
    #[error("failed to access campaign file {}", path.display())]
    Io {
        /// Campaign file being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The first line is not the campaign header.
    #[error("{}: bad campaign header {found:?}", path.display())]
    BadHeader {
        /// Campaign file.
        path: PathBuf,
        /// Line found in place of the header.
        found: String,
    },
    /// A level entry is an absolute path.
    #[error("{}: line {line}: level path {level:?} must be relative", path.display())]
    AbsolutePath {
        /// Campaign file.
        path: PathBuf,
        /// Offending line.
        line: usize,
        /// Offending entry.
        level: String,
    },
    /// A level entry names a file that does not exist.
    #[error("{}: line {line}: level {level:?} does not exist", path.display())]
    MissingLevel {
        /// Campaign file.
        path: PathBuf,
        /// Offending line.
        line: usize,
        /// Offending entry.
        level: String,
    },
}

/// Ordered collection of level files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Campaign {
    directory: PathBuf,
    levels: Vec<String>,
}

impl Campaign {
    /// Creates a campaign rooted at `directory` with the provided entries.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, levels: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            levels,
        }
    }

    /// Reads the campaign file at `path`.
    pub fn load(path: &Path) -> Result<Self, CampaignError> {
        let text = fs::read_to_string(path).map_err(|source| CampaignError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(path, directory, &text)
    }

    /// Parses campaign text; level entries are resolved against `directory`.
    pub fn parse(path: &Path, directory: &Path, text: &str) -> Result<Self, CampaignError> {
        let mut lines = text.lines().enumerate().map(|(index, line)| (index + 1, line));
        let header = lines.next().map_or("", |(_, line)| line);
        if header != CAMPAIGN_HEADER {
            return Err(CampaignError::BadHeader {
                path: path.to_path_buf(),
                found: header.to_owned(),
            });
        }

        let mut levels = Vec::new();
        for (line, entry) in lines {
            let entry = entry.trim_end();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            if Path::new(entry).is_absolute() {
                return Err(CampaignError::AbsolutePath {
                    path: path.to_path_buf(),
                    line,
                    level: entry.to_owned(),
                });
            }
            if !directory.join(entry).is_file() {
                return Err(CampaignError::MissingLevel {
                    path: path.to_path_buf(),
                    line,
                    level: entry.to_owned(),
                });
            }
            levels.push(entry.to_owned());
        }

        debug!(campaign = %path.display(), levels = levels.len(), "parsed campaign");
        Ok(Self {
            directory: directory.to_path_buf(),
            levels,
        })
    }

    /// Writes the campaign file to `path`.
    pub fn save(&self, path: &Path) -> Result<(), CampaignError> {
        fs::write(path, self.to_campaign_text()).map_err(|source| CampaignError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders the campaign file.
    #[must_use]
    pub fn to_campaign_text(&self) -> String {
        let mut text = String::from(CAMPAIGN_HEADER);
        text.push('\n');
        for level in &self.levels {
            text.push_str(level);
            text.push('\n');
        }
        text
    }

    /// Directory level entries are resolved against.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Level entries as written in the campaign file.
    #[must_use]
    pub fn level_names(&self) -> &[String] {
        &self.levels
    }

    /// Paths of the level files in campaign order.
    pub fn level_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.levels.iter().map(|level| self.directory.join(level))
    }

    /// Number of levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the campaign lists no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
