//! Optional TOML configuration shared by every subcommand.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use chronoshift_system_checker::CheckOptions;
use chronoshift_system_solution::ReplayMode;
use serde::Deserialize;

/// File consulted when no `--config` flag is given.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "chronoshift.toml";
const SUPPORTED_CONFIG_VERSION: u32 = 1;
const DEFAULT_LOG_FILTER: &str = "info";

/// Settings read from `chronoshift.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    version: u32,
    /// Filter handed to the log subscriber unless `RUST_LOG` is set.
    #[serde(default = "default_log_filter")]
    pub(crate) log_filter: String,
    #[serde(default)]
    check: CheckSection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CheckSection {
    require_solution: bool,
    naive_replay: bool,
    warn_unconnected: bool,
}

impl Default for CheckSection {
    fn default() -> Self {
        Self {
            require_solution: false,
            naive_replay: true,
            warn_unconnected: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            log_filter: default_log_filter(),
            check: CheckSection::default(),
        }
    }
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

impl Config {
    /// Loads `explicit` when given, otherwise the default file if it exists.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.is_file() {
                    Self::read(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("invalid configuration file {}", path.display()))
    }

    /// Parses configuration text and validates its version.
    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).context("failed to parse configuration toml contents")?;
        if config.version != SUPPORTED_CONFIG_VERSION {
            bail!(
                "unsupported configuration version {}; expected {}",
                config.version,
                SUPPORTED_CONFIG_VERSION
            );
        }
        Ok(config)
    }

    /// Checker switches derived from the `[check]` table.
    pub(crate) fn check_options(&self) -> CheckOptions {
        CheckOptions {
            require_solution: self.check.require_solution,
            replay_mode: if self.check.naive_replay {
                ReplayMode::Naive
            } else {
                ReplayMode::Exact
            },
            warn_unconnected: self.check.warn_unconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tables_fall_back_to_defaults() {
        let config = Config::parse("version = 1").expect("minimal config parses");
        assert_eq!(config, Config::default());
        assert_eq!(config.check_options(), CheckOptions::default());
    }

    #[test]
    fn check_table_overrides_options() {
        let config = Config::parse(
            r#"
            version = 1
            log_filter = "debug"

            [check]
            require_solution = true
            naive_replay = false
        "#,
        )
        .expect("config parses");

        assert_eq!(config.log_filter, "debug");
        let options = config.check_options();
        assert!(options.require_solution);
        assert_eq!(options.replay_mode, ReplayMode::Exact);
        assert!(options.warn_unconnected);
    }

    #[test]
    fn rejects_unknown_versions() {
        let error = Config::parse("version = 2").expect_err("version 2 is unknown");
        assert!(error.to_string().contains("unsupported configuration version 2"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = Config::parse("version = 1\n\n[check]\nsolvable = true\n");
        assert!(result.is_err(), "typos in the check table must be reported");
    }

    #[test]
    fn explicit_path_must_exist() {
        let directory = tempfile::tempdir().expect("temporary directory");
        let missing = directory.path().join("absent.toml");
        assert!(Config::load(Some(&missing)).is_err());

        let present = directory.path().join("chronoshift.toml");
        fs::write(&present, "version = 1\nlog_filter = \"warn\"\n").expect("write config");
        let config = Config::load(Some(&present)).expect("config loads");
        assert_eq!(config.log_filter, "warn");
    }
}
