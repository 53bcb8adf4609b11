//! Account and template write pipelines.
//!
//! Each pipeline is a fixed sequence of steps over a JSON payload: pull out
//! the write-only controls, lay template defaults underneath, check field
//! kinds, parse, guard the name, reconcile, then push.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::choices::{OnInvalid, SecretType, Source, protocol_secret_types};
use crate::db::{Account, AccountTemplate, RecordStore};
use crate::error::{Result, WardenError};
use crate::fields::{
    ACCOUNT_FIELDS, BULK_ACCOUNT_FIELDS, FieldSpec, FieldValues, TEMPLATE_FIELDS, check_kinds,
    merge_defaults,
};
use crate::push::{PushQueue, push_if_needed};

use super::bulk::{BulkResult, BulkTarget, bulk_create};
use super::naming::ensure_unique_name;
use super::reconcile::{AccountCandidate, Lookup, Outcome, reconcile, set_secret};
use super::template::{TemplateRef, resolve};

/// Write-only payload keys that steer a write instead of describing the
/// record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteControls {
    pub template: Option<String>,
    pub on_invalid: Option<OnInvalid>,
    pub push_now: bool,
    pub params: Option<Value>,
}

impl WriteControls {
    /// Remove the control keys from `payload` and parse them.
    pub fn take(payload: &mut FieldValues) -> Result<Self> {
        let template = match payload.remove("template") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(WardenError::validation(format!(
                    "template: expected an id, got {}",
                    other
                )));
            }
        };
        let on_invalid = match payload.remove("on_invalid") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.parse()?),
            Some(other) => {
                return Err(WardenError::validation(format!(
                    "on_invalid: expected a string, got {}",
                    other
                )));
            }
        };
        let push_now = match payload.remove("push_now") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => b,
            Some(other) => {
                return Err(WardenError::validation(format!(
                    "push_now: expected a boolean, got {}",
                    other
                )));
            }
        };
        let params = match payload.remove("params") {
            None | Some(Value::Null) => None,
            Some(v @ Value::Object(_)) => Some(v),
            Some(other) => {
                return Err(WardenError::validation(format!(
                    "params: expected an object, got {}",
                    other
                )));
            }
        };
        Ok(Self {
            template,
            on_invalid,
            push_now,
            params,
        })
    }
}

// ── Payload accessors ──────────────────────────────────────────────────

fn text(values: &FieldValues, key: &str) -> Option<String> {
    values.get(key).and_then(Value::as_str).map(str::to_string)
}

fn flag(values: &FieldValues, key: &str) -> Option<bool> {
    values.get(key).and_then(Value::as_bool)
}

fn choice<T: FromStr<Err = WardenError>>(values: &FieldValues, key: &str) -> Result<Option<T>> {
    text(values, key).map(|s| s.parse()).transpose()
}

fn required_text(values: &FieldValues, key: &str) -> Result<String> {
    text(values, key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WardenError::validation(format!("{}: This field is required.", key)))
}

/// Apply an optional template underneath `payload`. Returns the merged
/// values and the template id that was used.
fn with_template<S: RecordStore>(
    store: &S,
    template: Option<&str>,
    schema: &[FieldSpec],
    payload: FieldValues,
) -> Result<(FieldValues, Option<String>)> {
    let Some(id) = template else {
        return Ok((payload, None));
    };
    let resolved = resolve(store, TemplateRef::Id(id), schema)?;
    let merged = merge_defaults(schema, &resolved.values, &payload);
    Ok((merged, Some(resolved.template_id)))
}

fn check_su_from<S: RecordStore>(
    store: &S,
    su_from: &str,
    asset_id: &str,
    account_id: Option<&str>,
) -> Result<()> {
    if account_id == Some(su_from) {
        return Err(WardenError::validation("su_from: an account cannot switch from itself"));
    }
    match store.get_account(su_from)? {
        Some(a) if a.asset_id == asset_id => Ok(()),
        Some(_) => Err(WardenError::validation(
            "su_from: account must belong to the same asset",
        )),
        None => Err(WardenError::not_found(format!("Account not found: {}", su_from))),
    }
}

// ── Accounts ───────────────────────────────────────────────────────────

/// Create one account from a payload.
///
/// A `template` id supplies defaults for fields the payload omits. When the
/// account collides with one on the same asset, `on_invalid` (or
/// `default_policy`) decides what happens.
pub fn create_account<S: RecordStore>(
    store: &S,
    queue: &dyn PushQueue,
    mut payload: FieldValues,
    default_policy: OnInvalid,
) -> Result<(Account, Outcome)> {
    let controls = WriteControls::take(&mut payload)?;
    let (values, template_id) =
        with_template(store, controls.template.as_deref(), ACCOUNT_FIELDS, payload)?;
    check_kinds(ACCOUNT_FIELDS, &values)?;

    let asset_id = required_text(&values, "asset")?;
    let username = required_text(&values, "username")?;
    if store.get_asset(&asset_id)?.is_none() {
        return Err(WardenError::not_found(format!("Asset not found: {}", asset_id)));
    }
    let su_from = text(&values, "su_from");
    if let Some(su_from) = &su_from {
        check_su_from(store, su_from, &asset_id, None)?;
    }

    let name = ensure_unique_name(
        store,
        text(&values, "name").as_deref(),
        &username,
        &asset_id,
        None,
    )?;
    let candidate = AccountCandidate {
        asset_id,
        name,
        username,
        secret_type: choice(&values, "secret_type")?.unwrap_or_default(),
        secret: text(&values, "secret"),
        privileged: flag(&values, "privileged"),
        is_active: flag(&values, "is_active"),
        comment: text(&values, "comment"),
        su_from,
        source: if template_id.is_some() {
            Source::Template
        } else {
            Source::Manual
        },
        source_id: template_id,
    };

    let policy = controls.on_invalid.unwrap_or(default_policy);
    let (account, outcome) =
        store.transaction(|tx| reconcile(tx, &candidate, Lookup::NameOrSlot, policy))?;
    tracing::info!(account = %account.id, asset = %account.asset_id, ?outcome, "account write");

    if outcome.changed() {
        push_if_needed(
            queue,
            controls.push_now,
            &[account.id.clone()],
            controls.params.as_ref(),
        );
    }
    Ok((account, outcome))
}

/// Update an existing account. `username` and `asset` are immutable and
/// ignored; the template back-reference is dropped.
pub fn update_account<S: RecordStore>(
    store: &S,
    queue: &dyn PushQueue,
    account_id: &str,
    mut payload: FieldValues,
) -> Result<Account> {
    let controls = WriteControls::take(&mut payload)?;
    payload.remove("username");
    payload.remove("asset");
    let (values, _) =
        with_template(store, controls.template.as_deref(), ACCOUNT_FIELDS, payload)?;
    check_kinds(ACCOUNT_FIELDS, &values)?;

    let mut account = store
        .get_account(account_id)?
        .ok_or_else(|| WardenError::not_found(format!("Account not found: {}", account_id)))?;

    account.name = ensure_unique_name(
        store,
        text(&values, "name").as_deref(),
        &account.name,
        &account.asset_id,
        Some(&account),
    )?;
    if let Some(secret_type) = choice::<SecretType>(&values, "secret_type")? {
        account.secret_type = secret_type;
    }
    if let Some(secret) = text(&values, "secret") {
        set_secret(&mut account, &secret);
    }
    if let Some(privileged) = flag(&values, "privileged") {
        account.privileged = privileged;
    }
    if let Some(is_active) = flag(&values, "is_active") {
        account.is_active = is_active;
    }
    if let Some(comment) = text(&values, "comment") {
        account.comment = comment;
    }
    if values.contains_key("su_from") {
        account.su_from = text(&values, "su_from");
        if let Some(su_from) = &account.su_from {
            check_su_from(store, su_from, &account.asset_id, Some(&account.id))?;
        }
    }
    account.source_id = None;
    account.date_updated = Utc::now();

    store.transaction(|tx| tx.update_account(&account))?;
    tracing::info!(account = %account.id, version = account.version, "account updated");

    push_if_needed(
        queue,
        controls.push_now,
        &[account.id.clone()],
        controls.params.as_ref(),
    );
    Ok(account)
}

/// Create the same account on every asset listed under `assets`.
///
/// Unknown asset ids fail the whole call before anything is written.
pub fn bulk_create_accounts<S: RecordStore>(
    store: &S,
    queue: &dyn PushQueue,
    mut payload: FieldValues,
    default_policy: OnInvalid,
) -> Result<Vec<BulkResult>> {
    let controls = WriteControls::take(&mut payload)?;
    let asset_ids: Vec<String> = match payload.remove("assets") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    WardenError::validation(format!("assets: expected asset ids, got {}", v))
                })
            })
            .collect::<Result<_>>()?,
        _ => Vec::new(),
    };
    if asset_ids.is_empty() {
        return Err(WardenError::validation("assets: This field is required."));
    }

    let (values, template_id) =
        with_template(store, controls.template.as_deref(), BULK_ACCOUNT_FIELDS, payload)?;
    check_kinds(BULK_ACCOUNT_FIELDS, &values)?;

    let username = required_text(&values, "username")?;
    let name = text(&values, "name")
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| username.clone());
    let candidate = AccountCandidate {
        asset_id: String::new(),
        name,
        username,
        secret_type: choice(&values, "secret_type")?.unwrap_or_default(),
        secret: text(&values, "secret"),
        privileged: flag(&values, "privileged"),
        is_active: flag(&values, "is_active"),
        comment: text(&values, "comment"),
        su_from: None,
        source: if template_id.is_some() {
            Source::Template
        } else {
            Source::Manual
        },
        source_id: template_id,
    };

    let targets = asset_ids
        .iter()
        .map(|id| BulkTarget::load(store, id))
        .collect::<Result<Vec<_>>>()?;
    let policy = controls.on_invalid.unwrap_or(default_policy);
    let results = bulk_create(store, &candidate, &targets, policy)?;

    let changed: Vec<String> = results
        .iter()
        .filter(|r| r.changed)
        .filter_map(|r| r.account.clone())
        .collect();
    push_if_needed(queue, controls.push_now, &changed, controls.params.as_ref());
    Ok(results)
}

// ── Templates ──────────────────────────────────────────────────────────

/// Create an account template in `org`.
pub fn create_template<S: RecordStore>(
    store: &S,
    payload: &FieldValues,
    org: &str,
) -> Result<AccountTemplate> {
    check_kinds(TEMPLATE_FIELDS, payload)?;
    let now = Utc::now();
    let template = AccountTemplate {
        id: Uuid::new_v4().to_string(),
        org_id: org.to_string(),
        name: required_text(payload, "name")?,
        username: required_text(payload, "username")?,
        secret: text(payload, "secret"),
        secret_type: choice(payload, "secret_type")?.unwrap_or_default(),
        privileged: flag(payload, "privileged").unwrap_or(false),
        is_active: flag(payload, "is_active").unwrap_or(true),
        comment: text(payload, "comment"),
        date_created: now,
        date_updated: now,
    };

    store.insert_template(&template).map_err(|e| {
        if e.is_unique_violation() {
            WardenError::conflict(format!("Template name already exists: {}", template.name))
        } else {
            e
        }
    })?;
    tracing::info!(template = %template.id, name = %template.name, "template created");
    Ok(template)
}

/// Templates usable with any of `protocols`. Falls back to password
/// templates when the protocols imply no secret type.
pub fn templates_for_protocols<S: RecordStore>(
    store: &S,
    protocols: &[&str],
) -> Result<Vec<AccountTemplate>> {
    let mut secret_types: BTreeSet<SecretType> = protocols
        .iter()
        .flat_map(|p| protocol_secret_types(p).iter().copied())
        .collect();
    if secret_types.is_empty() {
        secret_types.insert(SecretType::Password);
    }
    let secret_types: Vec<SecretType> = secret_types.into_iter().collect();
    store.list_templates(Some(&secret_types))
}

/// Delete a template. Accounts created from it keep their `source_id`.
pub fn delete_template<S: RecordStore>(store: &S, id: &str) -> Result<()> {
    if store.delete_template(id)? {
        tracing::info!(template = id, "template deleted");
        Ok(())
    } else {
        Err(WardenError::not_found(format!("Template not found: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::test_support::{sample_account, seed_asset};
    use crate::db::MemoryStore;
    use crate::push::RecordingPushQueue;
    use serde_json::json;

    fn payload(value: Value) -> FieldValues {
        value.as_object().cloned().unwrap()
    }

    fn seed_template(store: &MemoryStore) -> AccountTemplate {
        create_template(
            store,
            &payload(json!({
                "name": "ops-root",
                "username": "root",
                "secret": "tpl-secret",
                "secret_type": "password",
                "privileged": true,
                "comment": "from template"
            })),
            "Default",
        )
        .unwrap()
    }

    #[test]
    fn test_take_controls() {
        let mut p = payload(json!({
            "username": "root",
            "template": "t1",
            "on_invalid": "skip",
            "push_now": true,
            "params": {"k": 1}
        }));
        let controls = WriteControls::take(&mut p).unwrap();
        assert_eq!(controls.template.as_deref(), Some("t1"));
        assert_eq!(controls.on_invalid, Some(OnInvalid::Skip));
        assert!(controls.push_now);
        assert_eq!(p.len(), 1);

        let mut bad = payload(json!({"on_invalid": "explode"}));
        assert!(WriteControls::take(&mut bad).is_err());
    }

    #[test]
    fn test_create_from_template_request_wins() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);
        let template = seed_template(&store);

        let (account, outcome) = create_account(
            &store,
            &queue,
            payload(json!({
                "asset": "a1",
                "template": template.id,
                "name": "admin",
                "username": "admin",
            })),
            OnInvalid::Error,
        )
        .unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert_eq!(account.name, "admin");
        assert_eq!(account.username, "admin");
        assert_eq!(account.secret.as_deref(), Some("tpl-secret"));
        assert!(account.privileged);
        assert_eq!(account.comment, "from template");
        assert_eq!(account.source, Source::Template);
        assert_eq!(account.source_id.as_deref(), Some(template.id.as_str()));
        assert!(queue.pushed().is_empty());
    }

    #[test]
    fn test_create_requires_asset_and_username() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);

        let err = create_account(&store, &queue, payload(json!({"username": "root"})), OnInvalid::Error)
            .unwrap_err();
        assert!(err.to_string().contains("asset"));

        let err = create_account(&store, &queue, payload(json!({"asset": "a1"})), OnInvalid::Error)
            .unwrap_err();
        assert!(err.to_string().contains("username"));

        let err = create_account(
            &store,
            &queue,
            payload(json!({"asset": "nope", "username": "root"})),
            OnInvalid::Error,
        )
        .unwrap_err();
        assert!(matches!(err, WardenError::NotFound(_)));
    }

    #[test]
    fn test_create_with_missing_template() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);

        let err = create_account(
            &store,
            &queue,
            payload(json!({"asset": "a1", "username": "root", "template": "ghost"})),
            OnInvalid::Error,
        )
        .unwrap_err();
        assert!(matches!(err, WardenError::NotFound(_)));
    }

    #[test]
    fn test_create_policies_and_push() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);
        let body = json!({"asset": "a1", "username": "root", "secret": "pw", "push_now": true});

        let (first, _) =
            create_account(&store, &queue, payload(body.clone()), OnInvalid::Error).unwrap();
        assert_eq!(queue.pushed().len(), 1);

        let err = create_account(&store, &queue, payload(body.clone()), OnInvalid::Error)
            .unwrap_err();
        assert!(matches!(err, WardenError::Conflict(_)));

        let mut skip = payload(body.clone());
        skip.insert("on_invalid".into(), json!("skip"));
        let (skipped, outcome) = create_account(&store, &queue, skip, OnInvalid::Error).unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(skipped.id, first.id);
        // skipped writes are not pushed
        assert_eq!(queue.pushed().len(), 1);

        let mut update = payload(body);
        update.insert("on_invalid".into(), json!("update"));
        update.insert("secret".into(), json!("pw2"));
        let (updated, outcome) = create_account(&store, &queue, update, OnInvalid::Error).unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(updated.version, 2);
        assert_eq!(queue.pushed().len(), 2);
    }

    #[test]
    fn test_create_rejects_foreign_su_from() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);
        seed_asset(&store, "a2", &["ssh"]);
        store.insert_account(&sample_account("x2", "a2", "root")).unwrap();

        let err = create_account(
            &store,
            &queue,
            payload(json!({"asset": "a1", "username": "ops", "su_from": "x2"})),
            OnInvalid::Error,
        )
        .unwrap_err();
        assert!(matches!(err, WardenError::Validation(_)));
    }

    #[test]
    fn test_update_keeps_username_and_clears_source() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);
        let mut account = sample_account("x1", "a1", "root");
        account.source = Source::Template;
        account.source_id = Some("t1".into());
        store.insert_account(&account).unwrap();

        let updated = update_account(
            &store,
            &queue,
            "x1",
            payload(json!({"username": "hacker", "secret": "rotated", "push_now": true})),
        )
        .unwrap();

        assert_eq!(updated.username, "root");
        assert_eq!(updated.name, "root");
        assert_eq!(updated.source_id, None);
        assert_eq!(updated.version, 2);
        assert_eq!(queue.pushed(), vec![(vec!["x1".to_string()], None)]);
    }

    #[test]
    fn test_update_missing_account() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        let err = update_account(&store, &queue, "nope", FieldValues::new()).unwrap_err();
        assert!(matches!(err, WardenError::NotFound(_)));
    }

    #[test]
    fn test_bulk_from_payload_pushes_changed_accounts() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);
        seed_asset(&store, "a2", &["ssh"]);
        store.insert_account(&sample_account("x1", "a2", "root")).unwrap();

        let results = bulk_create_accounts(
            &store,
            &queue,
            payload(json!({
                "assets": ["a1", "a2"],
                "username": "root",
                "on_invalid": "skip",
                "push_now": true
            })),
            OnInvalid::Error,
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        let pushed = queue.pushed();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0.len(), 1);
        assert_eq!(Some(&pushed[0].0[0]), results[0].account.as_ref());
    }

    #[test]
    fn test_bulk_requires_known_assets() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);

        let err = bulk_create_accounts(
            &store,
            &queue,
            payload(json!({"assets": ["a1", "ghost"], "username": "root"})),
            OnInvalid::Skip,
        )
        .unwrap_err();
        assert!(matches!(err, WardenError::NotFound(_)));
        assert!(store.list_accounts(None).unwrap().is_empty());

        let err = bulk_create_accounts(&store, &queue, payload(json!({"username": "root"})), OnInvalid::Skip)
            .unwrap_err();
        assert!(err.to_string().contains("assets"));
    }

    #[test]
    fn test_template_lifecycle() {
        let store = MemoryStore::new();
        let template = seed_template(&store);

        let err = create_template(
            &store,
            &payload(json!({"name": "ops-root", "username": "other"})),
            "Default",
        )
        .unwrap_err();
        assert!(matches!(err, WardenError::Conflict(_)));

        create_template(
            &store,
            &payload(json!({"name": "kube", "username": "sa", "secret_type": "token"})),
            "Default",
        )
        .unwrap();

        let ssh = templates_for_protocols(&store, &["ssh"]).unwrap();
        assert_eq!(ssh.len(), 1);
        let k8s = templates_for_protocols(&store, &["k8s"]).unwrap();
        assert_eq!(k8s[0].name, "kube");
        let none = templates_for_protocols(&store, &[]).unwrap();
        assert_eq!(none.len(), 1);

        delete_template(&store, &template.id).unwrap();
        assert!(matches!(
            delete_template(&store, &template.id),
            Err(WardenError::NotFound(_))
        ));
    }

    #[test]
    fn test_deleting_template_leaves_accounts() {
        let store = MemoryStore::new();
        let queue = RecordingPushQueue::new();
        seed_asset(&store, "a1", &["ssh"]);
        let template = seed_template(&store);

        let (account, _) = create_account(
            &store,
            &queue,
            payload(json!({"asset": "a1", "template": template.id})),
            OnInvalid::Error,
        )
        .unwrap();
        delete_template(&store, &template.id).unwrap();

        let stored = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(stored.source_id.as_deref(), Some(template.id.as_str()));
        // template name was copied as a default for the account name
        assert_eq!(stored.name, "ops-root");
    }
}
