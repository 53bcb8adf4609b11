//! Account name uniqueness within an asset.

use uuid::Uuid;

use crate::db::{Account, RecordStore};
use crate::error::Result;

/// Append a random 4-character token to `name`. A fresh token every call.
pub fn with_random_suffix(name: &str) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{}_{}", name, &token[..4])
}

/// Pick the name for an account on `asset_id`.
///
/// An explicit `candidate` always wins and is not checked for collisions; a
/// clash surfaces later as a uniqueness violation. Without one, `fallback`
/// (usually the username) is used, suffixed when another account on the
/// asset already has that name. When updating `existing` whose name already
/// equals the fallback, nothing changes.
pub fn ensure_unique_name<S: RecordStore>(
    store: &S,
    candidate: Option<&str>,
    fallback: &str,
    asset_id: &str,
    existing: Option<&Account>,
) -> Result<String> {
    if let Some(name) = candidate
        && !name.is_empty()
    {
        return Ok(name.to_string());
    }

    if existing.is_some_and(|a| a.name == fallback) {
        return Ok(fallback.to_string());
    }

    if store.find_account_by_name(asset_id, fallback)?.is_some() {
        let name = with_random_suffix(fallback);
        tracing::debug!(asset = asset_id, %name, "account name taken, suffixed");
        return Ok(name);
    }

    Ok(fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::test_support::{seed_asset, sample_account};
    use crate::db::MemoryStore;

    #[test]
    fn test_suffix_shape() {
        let name = with_random_suffix("root");
        assert!(name.starts_with("root_"));
        assert_eq!(name.len(), "root_".len() + 4);
    }

    #[test]
    fn test_explicit_name_is_kept_even_on_collision() {
        let store = MemoryStore::new();
        seed_asset(&store, "a1", &["ssh"]);
        store.insert_account(&sample_account("x1", "a1", "root")).unwrap();

        let name = ensure_unique_name(&store, Some("root"), "root", "a1", None).unwrap();
        assert_eq!(name, "root");
    }

    #[test]
    fn test_fallback_without_collision() {
        let store = MemoryStore::new();
        seed_asset(&store, "a1", &["ssh"]);
        let name = ensure_unique_name(&store, None, "admin", "a1", None).unwrap();
        assert_eq!(name, "admin");

        // Empty explicit names count as absent
        let name = ensure_unique_name(&store, Some(""), "admin", "a1", None).unwrap();
        assert_eq!(name, "admin");
    }

    #[test]
    fn test_fallback_collision_is_always_suffixed() {
        let store = MemoryStore::new();
        seed_asset(&store, "a1", &["ssh"]);
        store.insert_account(&sample_account("x1", "a1", "root")).unwrap();

        for _ in 0..32 {
            let name = ensure_unique_name(&store, None, "root", "a1", None).unwrap();
            assert_ne!(name, "root");
            assert!(name.starts_with("root_"));
        }
    }

    #[test]
    fn test_update_with_same_name_short_circuits() {
        let store = MemoryStore::new();
        seed_asset(&store, "a1", &["ssh"]);
        let existing = sample_account("x1", "a1", "root");
        store.insert_account(&existing).unwrap();

        let name = ensure_unique_name(&store, None, "root", "a1", Some(&existing)).unwrap();
        assert_eq!(name, "root");
    }

    #[test]
    fn test_collision_scoped_to_asset() {
        let store = MemoryStore::new();
        seed_asset(&store, "a1", &["ssh"]);
        seed_asset(&store, "a2", &["ssh"]);
        store.insert_account(&sample_account("x1", "a1", "root")).unwrap();

        let name = ensure_unique_name(&store, None, "root", "a2", None).unwrap();
        assert_eq!(name, "root");
    }
}
