//! CLI argument parsing structures.

use clap::{Args, Parser};
use std::path::PathBuf;

use super::commands::Commands;

/// Main CLI structure for warden.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Manage asset accounts, templates and platforms", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global configuration arguments available to all commands.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Database file to use instead of the configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file to use instead of searching the standard locations
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}
