//! The record store collaborator every component is handed explicitly.

use crate::choices::SecretType;
use crate::error::Result;

use super::models::{Account, AccountTemplate, Asset, Node, Platform};

/// Persistence operations the account/asset rules depend on.
///
/// Writes that break a uniqueness constraint must fail with
/// [`WardenError::UniqueViolation`](crate::error::WardenError::UniqueViolation)
/// so callers can tell a name collision apart from other failures.
pub trait RecordStore {
    /// Run `f` as one atomic unit. Changes made inside are discarded when `f`
    /// returns an error. Transactions may nest.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;

    // ── Platforms ──────────────────────────────────────────────────────
    fn insert_platform(&self, platform: &Platform) -> Result<()>;
    fn get_platform(&self, id: &str) -> Result<Option<Platform>>;
    fn list_platforms(&self) -> Result<Vec<Platform>>;

    // ── Assets ─────────────────────────────────────────────────────────
    /// Insert an asset together with its protocols, labels and node links.
    fn insert_asset(&self, asset: &Asset) -> Result<()>;
    fn get_asset(&self, id: &str) -> Result<Option<Asset>>;
    fn list_assets(&self) -> Result<Vec<Asset>>;
    /// Delete an asset; its protocols, label links, node links and accounts
    /// go with it.
    fn delete_asset(&self, id: &str) -> Result<bool>;

    // ── Nodes ──────────────────────────────────────────────────────────
    fn find_node(&self, full_value: &str) -> Result<Option<Node>>;
    fn insert_node(&self, node: &Node) -> Result<()>;

    // ── Templates ──────────────────────────────────────────────────────
    fn insert_template(&self, template: &AccountTemplate) -> Result<()>;
    fn get_template(&self, id: &str) -> Result<Option<AccountTemplate>>;
    /// List templates, optionally keeping only the given secret types.
    fn list_templates(&self, secret_types: Option<&[SecretType]>) -> Result<Vec<AccountTemplate>>;
    /// Delete a template. Accounts created from it are left alone.
    fn delete_template(&self, id: &str) -> Result<bool>;

    // ── Accounts ───────────────────────────────────────────────────────
    fn insert_account(&self, account: &Account) -> Result<()>;
    fn update_account(&self, account: &Account) -> Result<()>;
    fn get_account(&self, id: &str) -> Result<Option<Account>>;
    fn list_accounts(&self, asset_id: Option<&str>) -> Result<Vec<Account>>;
    fn find_account_by_name(&self, asset_id: &str, name: &str) -> Result<Option<Account>>;
    fn find_account_by_slot(
        &self,
        asset_id: &str,
        username: &str,
        secret_type: SecretType,
    ) -> Result<Option<Account>>;
}
