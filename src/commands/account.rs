//! Account command handlers.

use serde_json::json;

use crate::accounts::{AccountView, bulk_create_accounts, create_account, update_account};
use crate::cli::AccountCommands;
use crate::config::Config;
use crate::db::{RecordStore, SqliteRepository};
use crate::error::{Result, WardenError};
use crate::utils::{into_field_values, print_json, read_json};

pub fn handle_account(
    repo: &SqliteRepository,
    config: &Config,
    command: AccountCommands,
) -> Result<()> {
    let registry = config.labels();
    match command {
        AccountCommands::Add { file } => {
            let payload = into_field_values(read_json(&file)?)?;
            let (account, outcome) = create_account(repo, repo, payload, config.on_invalid()?)?;
            print_json(&json!({
                "state": outcome,
                "account": AccountView::new(&account, &registry, false),
            }))
        }
        AccountCommands::Update { id, file } => {
            let payload = into_field_values(read_json(&file)?)?;
            let account = update_account(repo, repo, &id, payload)?;
            print_json(&AccountView::new(&account, &registry, false))
        }
        AccountCommands::Bulk { file } => {
            let payload = into_field_values(read_json(&file)?)?;
            let results = bulk_create_accounts(repo, repo, payload, config.on_invalid()?)?;
            print_json(&results)
        }
        AccountCommands::List { asset } => {
            let views: Vec<AccountView> = repo
                .list_accounts(asset.as_deref())?
                .iter()
                .map(|a| AccountView::new(a, &registry, false))
                .collect();
            print_json(&views)
        }
        AccountCommands::Show { id, reveal } => {
            let account = repo
                .get_account(&id)?
                .ok_or_else(|| WardenError::not_found(format!("Account not found: {}", id)))?;
            if reveal {
                tracing::info!(account = %account.id, "account secret revealed");
            }
            print_json(&AccountView::new(&account, &registry, reveal))
        }
    }
}
