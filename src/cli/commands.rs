//! Command and subcommand definitions.

use clap::Subcommand;
use std::path::PathBuf;

use crate::choices::Category;

/// Top-level commands available in warden.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage platforms
    Platform {
        #[command(subcommand)]
        command: PlatformCommands,
    },
    /// Manage assets
    Asset {
        #[command(subcommand)]
        command: AssetCommands,
    },
    /// Manage account templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Show queued account pushes
    PushLog {
        /// Maximum number of pushes to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlatformCommands {
    /// Create a platform from a JSON payload
    Add {
        /// JSON file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List platforms
    List,
    /// List asset types with their display labels
    Types {
        /// Only types of this category
        #[arg(short, long)]
        category: Option<Category>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AssetCommands {
    /// Create an asset (with nested accounts) from a JSON payload
    Add {
        /// JSON file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List assets
    List,
    /// Show one asset
    Show { id: String },
    /// Delete an asset and its accounts
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Create a template from a JSON payload
    Add {
        /// JSON file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List templates
    List {
        /// Only templates usable with these protocols (comma-separated)
        #[arg(short, long)]
        protocols: Option<String>,
    },
    /// Delete a template; accounts created from it are kept
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Create an account from a JSON payload
    Add {
        /// JSON file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Update an account from a JSON payload
    Update {
        id: String,
        /// JSON file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Create the same account on many assets
    Bulk {
        /// JSON file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List accounts
    List {
        /// Only accounts of this asset
        #[arg(short, long)]
        asset: Option<String>,
    },
    /// Show one account
    Show {
        id: String,
        /// Include the secret in the output
        #[arg(long)]
        reveal: bool,
    },
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a config file with default values
    Generate {
        /// Path where to create the config file (default: ~/.config/warden/warden.kdl)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite existing config file if it exists
        #[arg(long)]
        overwrite: bool,
    },
    /// List current configuration
    List,
    /// Get a specific configuration value
    Get {
        /// Setting key (e.g., "on_invalid", "data_path", "org")
        key: String,
    },
    /// Set a configuration value
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
}
