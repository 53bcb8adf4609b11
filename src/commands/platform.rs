//! Platform command handlers.

use crate::assets::{PlatformPayload, create_platform};
use crate::cli::PlatformCommands;
use crate::config::Config;
use crate::db::{RecordStore, SqliteRepository};
use crate::error::Result;
use crate::utils::{print_json, read_json};

pub fn handle_platform(
    repo: &SqliteRepository,
    config: &Config,
    command: PlatformCommands,
) -> Result<()> {
    match command {
        PlatformCommands::Add { file } => {
            let payload: PlatformPayload = serde_json::from_value(read_json(&file)?)?;
            let platform = create_platform(repo, payload)?;
            print_json(&platform)
        }
        PlatformCommands::List => print_json(&repo.list_platforms()?),
        PlatformCommands::Types { category } => {
            print_json(&config.labels().type_choices(category))
        }
    }
}
