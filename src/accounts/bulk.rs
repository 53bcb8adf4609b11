//! Bulk account creation across many assets.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::choices::{OnInvalid, SecretType};
use crate::db::RecordStore;
use crate::error::{Result, WardenError};

use super::naming::with_random_suffix;
use super::reconcile::{AccountCandidate, Lookup, Outcome, reconcile};

/// Per-target state of a bulk creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkState {
    Created,
    Updated,
    Skipped,
    Error,
}

impl BulkState {
    /// Sort rank; higher ranks are listed first.
    pub fn rank(&self) -> u8 {
        match self {
            BulkState::Created => 3,
            BulkState::Updated => 2,
            BulkState::Skipped => 1,
            BulkState::Error => 0,
        }
    }
}

impl From<Outcome> for BulkState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Created => BulkState::Created,
            Outcome::Updated => BulkState::Updated,
            Outcome::Skipped => BulkState::Skipped,
        }
    }
}

/// Outcome for one target asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub asset: String,
    pub state: BulkState,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkResult {
    fn error(asset: &str, message: impl Into<String>) -> Self {
        Self {
            asset: asset.to_string(),
            state: BulkState::Error,
            changed: false,
            account: None,
            error: Some(message.into()),
        }
    }
}

/// A target asset and the secret types it can hold.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkTarget {
    pub asset_id: String,
    pub secret_types: BTreeSet<SecretType>,
}

impl BulkTarget {
    /// Load an asset and derive its capabilities from the platform protocols
    /// the asset exposes.
    pub fn load<S: RecordStore>(store: &S, asset_id: &str) -> Result<Self> {
        let asset = store
            .get_asset(asset_id)?
            .ok_or_else(|| WardenError::not_found(format!("Asset not found: {}", asset_id)))?;
        let platform = store.get_platform(&asset.platform_id)?.ok_or_else(|| {
            WardenError::not_found(format!("Platform not found: {}", asset.platform_id))
        })?;
        let names: Vec<&str> = asset.protocols.iter().map(|p| p.name.as_str()).collect();
        Ok(Self {
            asset_id: asset.id.clone(),
            secret_types: platform.secret_types_for(&names),
        })
    }
}

/// Reconcile `candidate` against every target, one transaction per target.
///
/// Targets that cannot hold the candidate's secret type and targets whose
/// reconciliation fails become `error` entries; the batch keeps going.
/// Results are ordered created, updated, skipped, error, keeping input order
/// within a state.
///
/// Under [`OnInvalid::Error`] an existing account is an "already exists"
/// error entry and the call fails with [`WardenError::BulkFailed`] when any
/// error entry exists.
/// Targets committed before that point stay committed.
pub fn bulk_create<S: RecordStore>(
    store: &S,
    candidate: &AccountCandidate,
    targets: &[BulkTarget],
    policy: OnInvalid,
) -> Result<Vec<BulkResult>> {
    let mut results = Vec::with_capacity(targets.len());

    for target in targets {
        let result = if !target.secret_types.contains(&candidate.secret_type) {
            BulkResult::error(
                &target.asset_id,
                format!(
                    "Asset does not support this secret type: {}",
                    candidate.secret_type
                ),
            )
        } else {
            create_for_target(store, &candidate.for_asset(&target.asset_id), policy)
        };
        tracing::info!(asset = %result.asset, state = ?result.state, "bulk account target done");
        results.push(result);
    }

    results.sort_by_key(|r| std::cmp::Reverse(r.state.rank()));

    if policy != OnInvalid::Error {
        return Ok(results);
    }

    // Under the error policy a collision is already a Conflict entry, never
    // a skip.
    let errors: Vec<BulkResult> = results
        .iter()
        .filter(|r| r.state == BulkState::Error)
        .cloned()
        .collect();
    if errors.is_empty() {
        Ok(results)
    } else {
        Err(WardenError::BulkFailed(errors))
    }
}

fn create_for_target<S: RecordStore>(
    store: &S,
    candidate: &AccountCandidate,
    policy: OnInvalid,
) -> BulkResult {
    let attempt = |c: &AccountCandidate| store.transaction(|tx| reconcile(tx, c, Lookup::Slot, policy));

    let outcome = match attempt(candidate) {
        Err(e) if e.is_unique_violation() => {
            let mut renamed = candidate.clone();
            renamed.name = with_random_suffix(&candidate.name);
            tracing::warn!(
                asset = %candidate.asset_id,
                name = %renamed.name,
                error = %e,
                "account name collided, retrying once"
            );
            attempt(&renamed)
        }
        other => other,
    };

    match outcome {
        Ok((account, outcome)) => BulkResult {
            asset: candidate.asset_id.clone(),
            state: outcome.into(),
            changed: outcome.changed(),
            account: Some(account.id),
            error: None,
        },
        Err(e) => BulkResult::error(&candidate.asset_id, e.to_string()),
    }
}
