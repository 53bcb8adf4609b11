//! Asset command handlers.

use serde_json::json;

use crate::accounts::AccountView;
use crate::assets::{AssetContext, AssetPayload, AssetView, create_asset, delete_asset};
use crate::cli::AssetCommands;
use crate::config::Config;
use crate::db::{RecordStore, SqliteRepository};
use crate::error::{Result, WardenError};
use crate::utils::{print_json, read_json};

pub fn handle_asset(repo: &SqliteRepository, config: &Config, command: AssetCommands) -> Result<()> {
    let registry = config.labels();
    match command {
        AssetCommands::Add { file } => {
            let payload: AssetPayload = serde_json::from_value(read_json(&file)?)?;
            let ctx = AssetContext {
                org: config.org(),
                default_policy: config.on_invalid()?,
            };
            let (asset, accounts) = create_asset(repo, repo, payload, &ctx)?;
            let accounts: Vec<AccountView> = accounts
                .iter()
                .map(|a| AccountView::new(a, &registry, false))
                .collect();
            print_json(&json!({
                "asset": AssetView::new(&asset, &registry),
                "accounts": accounts,
            }))
        }
        AssetCommands::List => {
            let views: Vec<AssetView> = repo
                .list_assets()?
                .iter()
                .map(|a| AssetView::new(a, &registry))
                .collect();
            print_json(&views)
        }
        AssetCommands::Show { id } => {
            let asset = repo
                .get_asset(&id)?
                .ok_or_else(|| WardenError::not_found(format!("Asset not found: {}", id)))?;
            print_json(&AssetView::new(&asset, &registry))
        }
        AssetCommands::Delete { id } => {
            delete_asset(repo, &id)?;
            println!("Deleted asset {}", id);
            Ok(())
        }
    }
}
