//! In-memory record store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::models::{Account, AccountTemplate, Asset, Node, Platform};
use super::store::RecordStore;
use crate::choices::SecretType;
use crate::error::{Result, WardenError};

#[derive(Debug, Clone, Default)]
struct State {
    platforms: BTreeMap<String, Platform>,
    assets: BTreeMap<String, Asset>,
    nodes: BTreeMap<String, Node>,
    templates: BTreeMap<String, AccountTemplate>,
    accounts: BTreeMap<String, Account>,
}

/// Record store kept in process memory. Enforces the same uniqueness rules
/// as the SQLite schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(|e| WardenError::Other(e.to_string()))
    }
}

fn check_account_unique(state: &State, account: &Account) -> Result<()> {
    let clash = state.accounts.values().find(|a| {
        a.id != account.id
            && a.asset_id == account.asset_id
            && (a.name == account.name
                || (a.username == account.username && a.secret_type == account.secret_type))
    });
    match clash {
        Some(a) if a.name == account.name => Err(WardenError::UniqueViolation(
            "accounts.asset_id, accounts.name".to_string(),
        )),
        Some(_) => Err(WardenError::UniqueViolation(
            "accounts.asset_id, accounts.username, accounts.secret_type".to_string(),
        )),
        None => Ok(()),
    }
}

impl RecordStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let snapshot = self.state()?.clone();
        let result = f(self);
        if result.is_err() {
            *self.state()? = snapshot;
        }
        result
    }

    fn insert_platform(&self, platform: &Platform) -> Result<()> {
        let mut state = self.state()?;
        if state.platforms.contains_key(&platform.id)
            || state.platforms.values().any(|p| p.name == platform.name)
        {
            return Err(WardenError::UniqueViolation("platforms.name".to_string()));
        }
        state.platforms.insert(platform.id.clone(), platform.clone());
        Ok(())
    }

    fn get_platform(&self, id: &str) -> Result<Option<Platform>> {
        Ok(self.state()?.platforms.get(id).cloned())
    }

    fn list_platforms(&self) -> Result<Vec<Platform>> {
        let mut platforms: Vec<_> = self.state()?.platforms.values().cloned().collect();
        platforms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(platforms)
    }

    fn insert_asset(&self, asset: &Asset) -> Result<()> {
        let mut state = self.state()?;
        if state.assets.contains_key(&asset.id) {
            return Err(WardenError::UniqueViolation("assets.id".to_string()));
        }
        if !state.platforms.contains_key(&asset.platform_id) {
            return Err(WardenError::not_found(format!(
                "Platform not found: {}",
                asset.platform_id
            )));
        }
        let mut stored = asset.clone();
        stored.protocols.sort_by(|a, b| a.name.cmp(&b.name));
        stored.labels.sort();
        stored.labels.dedup();
        stored.node_ids.sort();
        stored.node_ids.dedup();
        state.assets.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        Ok(self.state()?.assets.get(id).cloned())
    }

    fn list_assets(&self) -> Result<Vec<Asset>> {
        let mut assets: Vec<_> = self.state()?.assets.values().cloned().collect();
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }

    fn delete_asset(&self, id: &str) -> Result<bool> {
        let mut state = self.state()?;
        let removed = state.assets.remove(id).is_some();
        if removed {
            state.accounts.retain(|_, a| a.asset_id != id);
        }
        Ok(removed)
    }

    fn find_node(&self, full_value: &str) -> Result<Option<Node>> {
        Ok(self
            .state()?
            .nodes
            .values()
            .find(|n| n.full_value == full_value)
            .cloned())
    }

    fn insert_node(&self, node: &Node) -> Result<()> {
        let mut state = self.state()?;
        if state.nodes.values().any(|n| n.full_value == node.full_value) {
            return Err(WardenError::UniqueViolation("nodes.full_value".to_string()));
        }
        state.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    fn insert_template(&self, template: &AccountTemplate) -> Result<()> {
        let mut state = self.state()?;
        if state
            .templates
            .values()
            .any(|t| t.org_id == template.org_id && t.name == template.name)
        {
            return Err(WardenError::UniqueViolation(
                "account_templates.org_id, account_templates.name".to_string(),
            ));
        }
        state.templates.insert(template.id.clone(), template.clone());
        Ok(())
    }

    fn get_template(&self, id: &str) -> Result<Option<AccountTemplate>> {
        Ok(self.state()?.templates.get(id).cloned())
    }

    fn list_templates(&self, secret_types: Option<&[SecretType]>) -> Result<Vec<AccountTemplate>> {
        let mut templates: Vec<_> = self
            .state()?
            .templates
            .values()
            .filter(|t| match secret_types {
                Some(types) if !types.is_empty() => types.contains(&t.secret_type),
                _ => true,
            })
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    fn delete_template(&self, id: &str) -> Result<bool> {
        Ok(self.state()?.templates.remove(id).is_some())
    }

    fn insert_account(&self, account: &Account) -> Result<()> {
        let mut state = self.state()?;
        if state.accounts.contains_key(&account.id) {
            return Err(WardenError::UniqueViolation("accounts.id".to_string()));
        }
        if !state.assets.contains_key(&account.asset_id) {
            return Err(WardenError::not_found(format!(
                "Asset not found: {}",
                account.asset_id
            )));
        }
        check_account_unique(&state, account)?;
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn update_account(&self, account: &Account) -> Result<()> {
        let mut state = self.state()?;
        if !state.accounts.contains_key(&account.id) {
            return Err(WardenError::not_found(format!(
                "Account not found: {}",
                account.id
            )));
        }
        check_account_unique(&state, account)?;
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    fn get_account(&self, id: &str) -> Result<Option<Account>> {
        Ok(self.state()?.accounts.get(id).cloned())
    }

    fn list_accounts(&self, asset_id: Option<&str>) -> Result<Vec<Account>> {
        let mut accounts: Vec<_> = self
            .state()?
            .accounts
            .values()
            .filter(|a| asset_id.is_none_or(|id| a.asset_id == id))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| (&a.asset_id, &a.name).cmp(&(&b.asset_id, &b.name)));
        Ok(accounts)
    }

    fn find_account_by_name(&self, asset_id: &str, name: &str) -> Result<Option<Account>> {
        Ok(self
            .state()?
            .accounts
            .values()
            .find(|a| a.asset_id == asset_id && a.name == name)
            .cloned())
    }

    fn find_account_by_slot(
        &self,
        asset_id: &str,
        username: &str,
        secret_type: SecretType,
    ) -> Result<Option<Account>> {
        Ok(self
            .state()?
            .accounts
            .values()
            .find(|a| {
                a.asset_id == asset_id && a.username == username && a.secret_type == secret_type
            })
            .cloned())
    }
}
