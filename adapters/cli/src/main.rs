#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for checking, replaying and playing Chronoshift levels.

mod check;
mod config;
mod play;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "chronoshift", about = "Check and play Chronoshift levels")]
struct Cli {
    /// Configuration file; `chronoshift.toml` is used when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print a line for every level that passes and log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lint levels and replay their stored solutions.
    CheckLevel(check::CheckLevelArgs),
    /// Check every level of one or more campaigns.
    CheckCampaign(check::CheckCampaignArgs),
    /// Replay a level's stored solution and print the events.
    Replay(play::ReplayArgs),
    /// Play a level with actions read from stdin.
    Play(play::PlayArgs),
}

/// Entry point for the Chronoshift command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    match cli.command {
        Command::CheckLevel(args) => args.execute(&config, cli.verbose),
        Command::CheckCampaign(args) => args.execute(&config, cli.verbose),
        Command::Replay(args) => args.execute(),
        Command::Play(args) => args.execute(),
    }
}

fn init_tracing(config: &Config, verbose: bool) {
    let fallback = if verbose {
        "debug"
    } else {
        config.log_filter.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
