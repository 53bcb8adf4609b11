//! Conflict-policy reconciliation of a candidate account against the store.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::choices::{OnInvalid, SecretType, Source};
use crate::db::{Account, RecordStore};
use crate::error::{Result, WardenError};

/// What reconciliation did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

impl Outcome {
    /// Whether the store was written.
    pub fn changed(&self) -> bool {
        matches!(self, Outcome::Created | Outcome::Updated)
    }
}

/// How to look for an existing account on the candidate's asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Same `(username, secret_type)` slot, else same name. The slot match
    /// wins when both exist and point at different accounts.
    NameOrSlot,
    /// Same `(username, secret_type)` slot only.
    Slot,
}

/// A fully materialised account-to-be. `None` fields were not supplied and
/// are left alone when updating an existing account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountCandidate {
    pub asset_id: String,
    pub name: String,
    pub username: String,
    pub secret_type: SecretType,
    pub secret: Option<String>,
    pub privileged: Option<bool>,
    pub is_active: Option<bool>,
    pub comment: Option<String>,
    pub su_from: Option<String>,
    pub source: Source,
    pub source_id: Option<String>,
}

impl AccountCandidate {
    /// Copy of this candidate bound to another asset.
    pub fn for_asset(&self, asset_id: &str) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            ..self.clone()
        }
    }

    fn to_new_account(&self) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4().to_string(),
            asset_id: self.asset_id.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            secret: self.secret.clone(),
            secret_type: self.secret_type,
            source: self.source,
            source_id: self.source_id.clone(),
            version: 1,
            privileged: self.privileged.unwrap_or(false),
            is_active: self.is_active.unwrap_or(true),
            comment: self.comment.clone().unwrap_or_default(),
            su_from: self.su_from.clone(),
            date_created: now,
            date_updated: now,
        }
    }

    /// Overwrite `account` with every field this candidate carries.
    fn apply_to(&self, account: &mut Account) {
        account.name = self.name.clone();
        account.username = self.username.clone();
        account.secret_type = self.secret_type;
        account.source = self.source;
        account.source_id = self.source_id.clone();
        if let Some(secret) = &self.secret {
            set_secret(account, secret);
        }
        if let Some(privileged) = self.privileged {
            account.privileged = privileged;
        }
        if let Some(is_active) = self.is_active {
            account.is_active = is_active;
        }
        if let Some(comment) = &self.comment {
            account.comment = comment.clone();
        }
        if let Some(su_from) = &self.su_from {
            account.su_from = Some(su_from.clone());
        }
        account.date_updated = Utc::now();
    }
}

/// Replace the secret, bumping the version when it actually changes.
pub(crate) fn set_secret(account: &mut Account, secret: &str) {
    if account.secret.as_deref() != Some(secret) {
        account.secret = Some(secret.to_string());
        account.version += 1;
    }
}

/// Find the account `candidate` collides with, if any.
pub fn find_existing<S: RecordStore>(
    store: &S,
    candidate: &AccountCandidate,
    lookup: Lookup,
) -> Result<Option<Account>> {
    if let Some(account) =
        store.find_account_by_slot(&candidate.asset_id, &candidate.username, candidate.secret_type)?
    {
        return Ok(Some(account));
    }
    match lookup {
        Lookup::NameOrSlot => store.find_account_by_name(&candidate.asset_id, &candidate.name),
        Lookup::Slot => Ok(None),
    }
}

/// Create, update or skip `candidate` according to `policy`.
///
/// Under [`OnInvalid::Error`] a collision fails with `Conflict`. Callers that
/// need atomicity run this inside [`RecordStore::transaction`].
pub fn reconcile<S: RecordStore>(
    store: &S,
    candidate: &AccountCandidate,
    lookup: Lookup,
    policy: OnInvalid,
) -> Result<(Account, Outcome)> {
    let Some(mut existing) = find_existing(store, candidate, lookup)? else {
        let account = candidate.to_new_account();
        store.insert_account(&account)?;
        return Ok((account, Outcome::Created));
    };

    match policy {
        OnInvalid::Skip => Ok((existing, Outcome::Skipped)),
        OnInvalid::Update => {
            candidate.apply_to(&mut existing);
            store.update_account(&existing)?;
            Ok((existing, Outcome::Updated))
        }
        OnInvalid::Error => Err(WardenError::conflict("Account already exists")),
    }
}
