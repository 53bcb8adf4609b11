//! Config command handlers - managing configuration.

use std::path::PathBuf;

use crate::cli::ConfigCommands;
use crate::config::{Config, SETTINGS};
use crate::error::{Result, WardenError};

/// Handle `config` subcommands. `path` is the file the config was loaded
/// from, if any.
pub fn handle_config(config: Config, path: Option<PathBuf>, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Generate { path, overwrite } => {
            let config_path = Config::generate_config_file(path, overwrite)?;
            println!("Config file generated at: {}", config_path.display());
        }
        ConfigCommands::List => {
            println!("Current Configuration:");
            for key in SETTINGS {
                println!("  {}: {}", key, config.get_default(key)?);
            }
            println!("  db: {}", config.db_path().display());
            if !config.labels.is_empty() {
                println!();
                println!("Labels:");
                for label in &config.labels {
                    println!("  {} = {}", label.value, label.label);
                }
            }
        }
        ConfigCommands::Get { key } => {
            println!("{}", config.get_default(&key)?);
        }
        ConfigCommands::Set { key, value } => {
            let config_path = path.ok_or_else(|| {
                WardenError::config("Config file not found. Run 'warden config generate' first.")
            })?;
            let mut config = config;
            config.set_default(&key, &value)?;
            config.save(&config_path)?;
            println!("Updated {} = {}", key, value);
        }
    }
    Ok(())
}
