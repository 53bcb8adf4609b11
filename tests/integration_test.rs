//! Integration tests for the warden library.
//!
//! These run the public pipelines against an in-memory SQLite database.

use serde_json::{Value, json};
use warden::accounts::{
    BulkState, Outcome, bulk_create_accounts, create_account, create_template,
    templates_for_protocols, update_account,
};
use warden::assets::{
    AssetContext, AssetPayload, PlatformPayload, ProtocolConstraints, ProtocolEntry, create_asset,
    create_platform, delete_asset, validate_protocols,
};
use warden::choices::OnInvalid;
use warden::db::{Asset, SqliteRepository, init_db, init_memory_db};
use warden::fields::FieldValues;
use warden::{RecordStore, WardenError};

fn repo() -> SqliteRepository {
    SqliteRepository::new(init_memory_db().unwrap())
}

fn fields(value: Value) -> FieldValues {
    value.as_object().cloned().unwrap()
}

fn ctx() -> AssetContext {
    AssetContext {
        org: "Default".to_string(),
        default_policy: OnInvalid::Error,
    }
}

fn linux_platform(repo: &SqliteRepository) -> String {
    let payload: PlatformPayload = serde_json::from_value(json!({
        "name": "Linux",
        "category": "host",
        "type": "linux",
        "su_enabled": true,
        "protocols": [
            {"name": "ssh", "port": 22},
            {"name": "sftp", "port": 22, "default": true}
        ]
    }))
    .unwrap();
    create_platform(repo, payload).unwrap().id
}

fn asset(repo: &SqliteRepository, platform: &str, name: &str) -> Asset {
    let payload: AssetPayload = serde_json::from_value(json!({
        "name": name,
        "address": "10.0.0.1",
        "platform": platform,
    }))
    .unwrap();
    create_asset(repo, repo, payload, &ctx()).unwrap().0
}

#[test]
fn test_bulk_update_orders_created_before_updated() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let a = asset(&repo, &platform, "a");
    let b = asset(&repo, &platform, "b");
    let c = asset(&repo, &platform, "c");
    create_account(
        &repo,
        &repo,
        fields(json!({"asset": a.id, "username": "root", "secret": "old"})),
        OnInvalid::Error,
    )
    .unwrap();

    let results = bulk_create_accounts(
        &repo,
        &repo,
        fields(json!({
            "assets": [a.id, b.id, c.id],
            "username": "root",
            "secret": "new",
            "on_invalid": "update"
        })),
        OnInvalid::Error,
    )
    .unwrap();

    let states: Vec<(String, BulkState)> =
        results.iter().map(|r| (r.asset.clone(), r.state)).collect();
    assert_eq!(
        states,
        vec![
            (b.id.clone(), BulkState::Created),
            (c.id.clone(), BulkState::Created),
            (a.id.clone(), BulkState::Updated),
        ]
    );
    let updated = &repo.list_accounts(Some(&a.id)).unwrap()[0];
    assert_eq!(updated.secret.as_deref(), Some("new"));
    assert_eq!(updated.version, 2);
}

#[test]
fn test_strict_bulk_fails_but_keeps_committed_targets() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let a = asset(&repo, &platform, "a");
    let b = asset(&repo, &platform, "b");
    let c = asset(&repo, &platform, "c");
    create_account(
        &repo,
        &repo,
        fields(json!({"asset": b.id, "username": "root"})),
        OnInvalid::Error,
    )
    .unwrap();

    let err = bulk_create_accounts(
        &repo,
        &repo,
        fields(json!({"assets": [a.id, b.id, c.id], "username": "root"})),
        OnInvalid::Error,
    )
    .unwrap_err();

    match err {
        WardenError::BulkFailed(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].asset, b.id);
            assert_eq!(errors[0].state, BulkState::Error);
            assert!(errors[0].error.as_deref().unwrap().contains("already exists"));
        }
        other => panic!("expected BulkFailed, got {other:?}"),
    }
    assert_eq!(repo.list_accounts(Some(&a.id)).unwrap().len(), 1);
    assert_eq!(repo.list_accounts(Some(&c.id)).unwrap().len(), 1);
    assert_eq!(repo.list_accounts(Some(&b.id)).unwrap().len(), 1);
}

#[test]
fn test_bulk_unknown_asset_fails_before_writing() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let a = asset(&repo, &platform, "a");

    let err = bulk_create_accounts(
        &repo,
        &repo,
        fields(json!({"assets": [a.id, "missing"], "username": "root"})),
        OnInvalid::Skip,
    )
    .unwrap_err();

    assert!(matches!(err, WardenError::NotFound(_)));
    assert!(repo.list_accounts(Some(&a.id)).unwrap().is_empty());
}

#[test]
fn test_duplicate_protocol_last_port_wins() {
    let entries = vec![ProtocolEntry::new("rdp", 3389), ProtocolEntry::new("rdp", 3390)];
    let validated = validate_protocols(&entries, &ProtocolConstraints::default()).unwrap();

    assert_eq!(validated.len(), 1);
    assert_eq!(validated[0].port, 3390);
    assert!(validated[0].primary);
    assert_eq!(
        validate_protocols(&validated, &ProtocolConstraints::default()).unwrap(),
        validated
    );
}

#[test]
fn test_asset_port_out_of_range() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let payload: AssetPayload = serde_json::from_value(json!({
        "name": "win",
        "address": "10.0.0.9",
        "platform": platform,
        "protocols": ["ssh/22", {"name": "rdp", "port": 70000}]
    }))
    .unwrap();

    let err = create_asset(&repo, &repo, payload, &ctx()).unwrap_err();
    assert!(matches!(err, WardenError::Range(_)));
    assert!(err.to_string().contains("rdp"));
    assert!(repo.list_assets().unwrap().is_empty());
}

#[test]
fn test_asset_requires_platform_primary_protocol() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let payload: AssetPayload = serde_json::from_value(json!({
        "name": "web",
        "address": "10.0.0.2",
        "platform": platform,
        "protocols": ["sftp/2222"]
    }))
    .unwrap();

    let err = create_asset(&repo, &repo, payload, &ctx()).unwrap_err();
    assert!(matches!(err, WardenError::MissingProtocol(ref names) if names == &["ssh"]));
}

#[test]
fn test_template_supplies_defaults() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let a = asset(&repo, &platform, "a");
    let template = create_template(
        &repo,
        &fields(json!({
            "name": "ops",
            "username": "ops",
            "secret": "tpl-secret",
            "privileged": true
        })),
        "Default",
    )
    .unwrap();

    let (account, outcome) = create_account(
        &repo,
        &repo,
        fields(json!({"asset": a.id, "template": template.id, "comment": "from request"})),
        OnInvalid::Error,
    )
    .unwrap();

    assert_eq!(outcome, Outcome::Created);
    assert_eq!(account.username, "ops");
    assert_eq!(account.secret.as_deref(), Some("tpl-secret"));
    assert!(account.privileged);
    assert_eq!(account.comment, "from request");
    assert_eq!(account.source_id.as_deref(), Some(template.id.as_str()));

    let usable = templates_for_protocols(&repo, &["ssh"]).unwrap();
    assert_eq!(usable.len(), 1);

    let duplicate = create_template(
        &repo,
        &fields(json!({"name": "ops", "username": "other"})),
        "Default",
    )
    .unwrap_err();
    assert!(matches!(duplicate, WardenError::Conflict(_)));
}

#[test]
fn test_skip_is_idempotent_and_update_drops_source() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let a = asset(&repo, &platform, "a");
    let body = json!({"asset": a.id, "username": "deploy", "on_invalid": "skip"});

    let (first, created) =
        create_account(&repo, &repo, fields(body.clone()), OnInvalid::Error).unwrap();
    let (second, skipped) = create_account(&repo, &repo, fields(body), OnInvalid::Error).unwrap();
    assert_eq!(created, Outcome::Created);
    assert_eq!(skipped, Outcome::Skipped);
    assert_eq!(first.id, second.id);

    let updated = update_account(
        &repo,
        &repo,
        &first.id,
        fields(json!({"secret": "rotated", "username": "ignored"})),
    )
    .unwrap();
    assert_eq!(updated.username, "deploy");
    assert_eq!(updated.version, 2);
    assert_eq!(updated.source_id, None);
}

#[test]
fn test_asset_with_nested_accounts_and_nodes() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let source = asset(&repo, &platform, "source");
    let (cloned_from, _) = create_account(
        &repo,
        &repo,
        fields(json!({"asset": source.id, "username": "admin", "secret": "s3cret"})),
        OnInvalid::Error,
    )
    .unwrap();

    let payload: AssetPayload = serde_json::from_value(json!({
        "name": "db-1",
        "address": "10.0.0.3",
        "platform": platform,
        "labels": ["env:prod"],
        "nodes_display": ["dev/db"],
        "accounts": [
            {"username": "root", "secret": "pw"},
            {"id": cloned_from.id, "username": "admin"}
        ]
    }))
    .unwrap();
    let (stored, accounts) = create_asset(&repo, &repo, payload, &ctx()).unwrap();

    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[1].secret.as_deref(), Some("s3cret"));
    assert_eq!(stored.labels[0].name, "env");
    assert_eq!(stored.node_ids.len(), 1);
    assert!(repo.find_node("/Default/dev").unwrap().is_some());
    assert!(repo.find_node("/Default/dev/db").unwrap().is_some());
    let names: Vec<&str> = stored.protocols.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["sftp", "ssh"]);

    delete_asset(&repo, &stored.id).unwrap();
    assert!(repo.list_accounts(Some(&stored.id)).unwrap().is_empty());
    assert!(matches!(
        delete_asset(&repo, &stored.id),
        Err(WardenError::NotFound(_))
    ));
}

#[test]
fn test_push_now_writes_outbox() {
    let repo = repo();
    let platform = linux_platform(&repo);
    let a = asset(&repo, &platform, "a");

    let (account, _) = create_account(
        &repo,
        &repo,
        fields(json!({
            "asset": a.id,
            "username": "root",
            "push_now": true,
            "params": {"sudo": true}
        })),
        OnInvalid::Error,
    )
    .unwrap();
    create_account(
        &repo,
        &repo,
        fields(json!({"asset": a.id, "username": "quiet"})),
        OnInvalid::Error,
    )
    .unwrap();

    let tasks = repo.list_push_tasks(None).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].account_ids, vec![account.id]);
    assert_eq!(tasks[0].params, Some(json!({"sudo": true})));
}

#[test]
fn test_file_database_persists() {
    let path = std::env::temp_dir().join(format!("warden-{}.db", uuid::Uuid::new_v4()));
    {
        let repo = SqliteRepository::new(init_db(&path).unwrap());
        linux_platform(&repo);
    }
    let reopened = SqliteRepository::new(init_db(&path).unwrap());
    assert_eq!(reopened.list_platforms().unwrap().len(), 1);
    let _ = std::fs::remove_file(path);
}
