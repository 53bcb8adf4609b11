//! Asset creation with nested protocols, nodes, labels and accounts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::create_account;
use crate::choices::{ChoiceRegistry, LabeledChoice, OnInvalid};
use crate::db::{Account, Asset, Label, Node, RecordStore};
use crate::error::{Result, WardenError};
use crate::fields::FieldValues;
use crate::push::PushQueue;

use super::protocols::{ProtocolConstraints, ProtocolEntry, validate_protocols};

/// A protocol given either as `{name, port}` or as `"name/port"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProtocolInput {
    Text(String),
    Entry(ProtocolEntry),
}

impl ProtocolInput {
    fn into_entry(self) -> Result<ProtocolEntry> {
        match self {
            ProtocolInput::Text(s) => s.parse(),
            ProtocolInput::Entry(e) => Ok(e),
        }
    }
}

/// A label given either as `{name, value}` or as `"name:value"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LabelInput {
    Text(String),
    Pair(Label),
}

impl LabelInput {
    fn into_label(self) -> Result<Label> {
        match self {
            LabelInput::Pair(label) => Ok(label),
            LabelInput::Text(s) => {
                let (name, value) = s.split_once(':').ok_or_else(|| {
                    WardenError::validation(format!("Invalid label '{}'. Expected name:value", s))
                })?;
                Ok(Label {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                })
            }
        }
    }
}

fn default_true() -> bool {
    true
}

/// An asset as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetPayload {
    pub name: String,
    pub address: String,
    pub platform: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub comment: String,
    /// Absent means "use the platform's required and default protocols".
    #[serde(default)]
    pub protocols: Option<Vec<ProtocolInput>>,
    #[serde(default)]
    pub labels: Vec<LabelInput>,
    /// Node paths; relative paths hang under the organization root.
    #[serde(default)]
    pub nodes_display: Vec<String>,
    /// Account payloads created on the new asset. An `id` key copies the
    /// secret of that existing account.
    #[serde(default)]
    pub accounts: Vec<FieldValues>,
}

/// Settings asset creation takes from configuration.
#[derive(Debug, Clone)]
pub struct AssetContext {
    pub org: String,
    pub default_policy: OnInvalid,
}

/// Normalize a node path: relative paths are placed under `/{org}`.
pub fn node_full_value(path: &str, org: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}/{}", org, trimmed)
    }
}

/// Find the node at `full_value`, creating it and any missing ancestors.
pub fn get_or_create_node<S: RecordStore>(store: &S, full_value: &str) -> Result<Node> {
    if let Some(node) = store.find_node(full_value)? {
        return Ok(node);
    }
    let parent_id = match full_value.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => Some(get_or_create_node(store, parent)?.id),
        _ => None,
    };
    let node = Node {
        id: Uuid::new_v4().to_string(),
        full_value: full_value.to_string(),
        parent_id,
    };
    store.insert_node(&node)?;
    tracing::debug!(node = %node.full_value, "node created");
    Ok(node)
}

/// Create an asset and everything nested in the payload as one unit.
///
/// Returns the stored asset (protocols ordered by name) and the accounts
/// created on it.
pub fn create_asset<S: RecordStore>(
    store: &S,
    queue: &dyn PushQueue,
    payload: AssetPayload,
    ctx: &AssetContext,
) -> Result<(Asset, Vec<Account>)> {
    if payload.name.trim().is_empty() {
        return Err(WardenError::validation("name: This field is required."));
    }
    let platform = store
        .get_platform(&payload.platform)?
        .ok_or_else(|| WardenError::not_found(format!("Platform not found: {}", payload.platform)))?;

    let constraints = ProtocolConstraints::from_platform(&platform);
    let entries = match payload.protocols {
        Some(inputs) => inputs
            .into_iter()
            .map(ProtocolInput::into_entry)
            .collect::<Result<Vec<_>>>()?,
        None => constraints.defaults_for(&platform),
    };
    let protocols = validate_protocols(&entries, &constraints)?
        .iter()
        .map(ProtocolEntry::to_binding)
        .collect::<Result<Vec<_>>>()?;
    let labels = payload
        .labels
        .into_iter()
        .map(LabelInput::into_label)
        .collect::<Result<Vec<_>>>()?;

    let paths: Vec<String> = if payload.nodes_display.is_empty() {
        vec![format!("/{}", ctx.org)]
    } else {
        payload
            .nodes_display
            .iter()
            .map(|p| node_full_value(p, &ctx.org))
            .collect()
    };

    let asset_id = Uuid::new_v4().to_string();
    let domain = payload.domain.filter(|_| platform.domain_enabled);
    let nested = payload.accounts;

    store.transaction(|tx| {
        let node_ids = paths
            .iter()
            .map(|p| get_or_create_node(tx, p).map(|n| n.id))
            .collect::<Result<Vec<_>>>()?;

        let asset = Asset {
            id: asset_id.clone(),
            name: payload.name.clone(),
            address: payload.address.clone(),
            platform_id: platform.id.clone(),
            category: platform.category,
            asset_type: platform.asset_type,
            domain: domain.clone(),
            is_active: payload.is_active,
            comment: payload.comment.clone(),
            protocols: protocols.clone(),
            labels: labels.clone(),
            node_ids,
            date_created: Utc::now(),
        };
        tx.insert_asset(&asset)?;

        let mut accounts = Vec::with_capacity(nested.len());
        for data in &nested {
            let mut data = data.clone();
            if let Some(clone_id) = data.remove("id") {
                let clone_id = clone_id.as_str().unwrap_or_default().to_string();
                let source = tx.get_account(&clone_id)?.ok_or_else(|| {
                    WardenError::not_found(format!("Account not found: {}", clone_id))
                })?;
                data.insert(
                    "secret".to_string(),
                    source.secret.map(Into::into).unwrap_or_default(),
                );
            }
            data.insert("asset".to_string(), asset.id.clone().into());
            let (account, _) = create_account(tx, queue, data, ctx.default_policy)?;
            accounts.push(account);
        }

        let stored = tx
            .get_asset(&asset.id)?
            .ok_or_else(|| WardenError::not_found(format!("Asset not found: {}", asset.id)))?;
        tracing::info!(asset = %stored.id, name = %stored.name, accounts = accounts.len(), "asset created");
        Ok((stored, accounts))
    })
}

/// Delete an asset together with everything it owns.
pub fn delete_asset<S: RecordStore>(store: &S, id: &str) -> Result<()> {
    if store.delete_asset(id)? {
        tracing::info!(asset = id, "asset deleted");
        Ok(())
    } else {
        Err(WardenError::not_found(format!("Asset not found: {}", id)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetView {
    pub id: String,
    pub name: String,
    pub address: String,
    pub platform: String,
    pub category: LabeledChoice,
    #[serde(rename = "type")]
    pub asset_type: LabeledChoice,
    pub domain: Option<String>,
    pub is_active: bool,
    pub comment: String,
    pub protocols: Vec<ProtocolEntry>,
    pub labels: Vec<Label>,
    pub nodes: Vec<String>,
    pub date_created: chrono::DateTime<Utc>,
}

impl AssetView {
    pub fn new(asset: &Asset, registry: &ChoiceRegistry) -> Self {
        Self {
            id: asset.id.clone(),
            name: asset.name.clone(),
            address: asset.address.clone(),
            platform: asset.platform_id.clone(),
            category: registry.labeled(asset.category.as_str(), asset.category.label()),
            asset_type: registry.labeled(asset.asset_type.as_str(), asset.asset_type.label()),
            domain: asset.domain.clone(),
            is_active: asset.is_active,
            comment: asset.comment.clone(),
            protocols: asset.protocols.iter().map(ProtocolEntry::from).collect(),
            labels: asset.labels.clone(),
            nodes: asset.node_ids.clone(),
            date_created: asset.date_created,
        }
    }
}
