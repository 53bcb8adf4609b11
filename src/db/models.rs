//! Record structs as stored by a `RecordStore`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::choices::{AssetType, Category, Charset, SecretType, Source, SuMethod};

/// A credential bound to exactly one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub asset_id: String,
    pub name: String,
    pub username: String,
    pub secret: Option<String>,
    pub secret_type: SecretType,
    pub source: Source,
    /// Template the account was created from. Never re-resolved.
    pub source_id: Option<String>,
    pub version: i32,
    pub privileged: bool,
    pub is_active: bool,
    pub comment: String,
    pub su_from: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Reusable default values for new accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountTemplate {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub username: String,
    pub secret: Option<String>,
    pub secret_type: SecretType,
    pub privileged: bool,
    pub is_active: bool,
    pub comment: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// A named protocol configuration (port and flags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub secret_types: BTreeSet<SecretType>,
}

/// A key/value label attached to assets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// A node in the asset tree, addressed by its full path (`/Default/dev`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub full_value: String,
    pub parent_id: Option<String>,
}

/// A managed target resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub address: String,
    pub platform_id: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub domain: Option<String>,
    pub is_active: bool,
    pub comment: String,
    /// Ordered by name when read back from a store.
    pub protocols: Vec<Protocol>,
    pub labels: Vec<Label>,
    pub node_ids: Vec<String>,
    pub date_created: DateTime<Utc>,
}

/// Automation switches of a platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Automation {
    pub ansible_enabled: bool,
    pub ansible_config: Option<Value>,
    pub ping_enabled: bool,
    pub push_account_enabled: bool,
    pub gather_facts_enabled: bool,
    pub change_secret_enabled: bool,
    pub verify_account_enabled: bool,
    pub gather_accounts_enabled: bool,
}

/// One entry of a platform's custom field schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default = "default_custom_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub help_text: String,
    #[serde(default)]
    pub choices: Vec<String>,
}

fn default_custom_field_type() -> String {
    "str".to_string()
}

/// Operating profile shared by assets of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub charset: Charset,
    pub domain_enabled: bool,
    pub su_enabled: bool,
    pub su_method: Option<SuMethod>,
    pub automation: Automation,
    pub protocols: Vec<Protocol>,
    pub custom_fields: Vec<CustomField>,
    pub comment: String,
    pub date_created: DateTime<Utc>,
}

impl Platform {
    /// Secret types an asset on this platform can use, given the protocol
    /// names the asset actually exposes.
    pub fn secret_types_for(&self, protocol_names: &[&str]) -> BTreeSet<SecretType> {
        self.protocols
            .iter()
            .filter(|p| protocol_names.contains(&p.name.as_str()))
            .flat_map(|p| p.secret_types.iter().copied())
            .collect()
    }
}

/// A queued request to push accounts to their assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushTask {
    pub id: i64,
    pub account_ids: Vec<String>,
    pub params: Option<Value>,
    pub created_at: DateTime<Utc>,
}
