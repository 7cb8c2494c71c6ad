//! `check-level` and `check-campaign` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chronoshift_system_checker::{check_level, CheckOptions, CheckReport, UnsolvableError};
use chronoshift_system_solution::ReplayMode;
use chronoshift_world::{campaign::Campaign, Level};
use clap::Args;
use tracing::info;

use crate::config::Config;

/// Arguments of the `check-level` subcommand.
#[derive(Debug, Args)]
pub(crate) struct CheckLevelArgs {
    /// Level files to check.
    #[arg(required = true)]
    levels: Vec<PathBuf>,
    /// Fail if a level carries no solution.
    #[arg(long)]
    solvable: bool,
    /// Fail unless the stored solution ends in a time paradox.
    #[arg(long)]
    test_time_paradox: bool,
    /// Replay solutions exactly as written, without loop padding.
    #[arg(long)]
    exact_replay: bool,
}

impl CheckLevelArgs {
    /// Checks every level, stopping at the first failure.
    pub(crate) fn execute(self, config: &Config, verbose: bool) -> Result<()> {
        let mut options = config.check_options();
        options.require_solution |= self.solvable || self.test_time_paradox;
        if self.exact_replay {
            options.replay_mode = ReplayMode::Exact;
        }

        for path in &self.levels {
            let mut level = Level::load(path)?;
            match check_level(&mut level, &options) {
                Ok(_) if self.test_time_paradox => {
                    bail!(
                        "lvl {}: expected a time paradox, but none occurred",
                        level.name()
                    );
                }
                Ok(report) => {
                    if verbose {
                        println!("{}", summarize(path, &report));
                    }
                }
                Err(UnsolvableError::TimeParadox { reason, .. }) if self.test_time_paradox => {
                    if verbose {
                        println!("{}: time paradox as expected ({reason})", path.display());
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }
}

/// Arguments of the `check-campaign` subcommand.
#[derive(Debug, Args)]
pub(crate) struct CheckCampaignArgs {
    /// Campaign files to check.
    #[arg(required = true)]
    campaigns: Vec<PathBuf>,
}

impl CheckCampaignArgs {
    /// Checks every level of every campaign; each level must be solvable.
    pub(crate) fn execute(self, config: &Config, verbose: bool) -> Result<()> {
        let options = CheckOptions {
            require_solution: true,
            ..config.check_options()
        };

        for path in &self.campaigns {
            let campaign = Campaign::load(path)?;
            for level_path in campaign.level_paths() {
                let mut level = Level::load(&level_path)?;
                let report = check_level(&mut level, &options)?;
                if verbose {
                    println!("{}", summarize(&level_path, &report));
                }
            }
            info!(
                campaign = %path.display(),
                levels = campaign.len(),
                "campaign checked"
            );
        }
        Ok(())
    }
}

fn summarize(path: &Path, report: &CheckReport) -> String {
    match report.solved {
        Some(solved) => format!(
            "{}: ok, solved with {} clones and score {}",
            path.display(),
            solved.clones,
            solved.score
        ),
        None => format!("{}: ok, no solution", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoshift_system_checker::SolvedLevel;

    #[test]
    fn summaries_mention_score_and_clones() {
        let report = CheckReport {
            warnings: Vec::new(),
            solved: Some(SolvedLevel {
                clones: 2,
                score: 15,
            }),
        };
        assert_eq!(
            summarize(Path::new("relay.txt"), &report),
            "relay.txt: ok, solved with 2 clones and score 15"
        );

        let unsolved = CheckReport {
            warnings: Vec::new(),
            solved: None,
        };
        assert_eq!(
            summarize(Path::new("relay.txt"), &unsolved),
            "relay.txt: ok, no solution"
        );
    }
}
