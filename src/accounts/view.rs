//! Read-side renderings of accounts and templates.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::choices::{ChoiceRegistry, LabeledChoice};
use crate::db::{Account, AccountTemplate};

/// An account as shown to a caller. The secret is withheld unless revealed.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub id: String,
    pub asset: String,
    pub name: String,
    pub username: String,
    pub secret_type: LabeledChoice,
    pub source: LabeledChoice,
    pub source_id: Option<String>,
    pub version: i32,
    pub privileged: bool,
    pub is_active: bool,
    pub comment: String,
    pub su_from: Option<String>,
    pub has_secret: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

impl AccountView {
    pub fn new(account: &Account, registry: &ChoiceRegistry, reveal: bool) -> Self {
        Self {
            id: account.id.clone(),
            asset: account.asset_id.clone(),
            name: account.name.clone(),
            username: account.username.clone(),
            secret_type: registry.labeled(account.secret_type.as_str(), account.secret_type.label()),
            source: registry.labeled(account.source.as_str(), account.source.label()),
            source_id: account.source_id.clone(),
            version: account.version,
            privileged: account.privileged,
            is_active: account.is_active,
            comment: account.comment.clone(),
            su_from: account.su_from.clone(),
            has_secret: account.secret.is_some(),
            secret: if reveal { account.secret.clone() } else { None },
            date_created: account.date_created,
            date_updated: account.date_updated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub username: String,
    pub secret_type: LabeledChoice,
    pub privileged: bool,
    pub is_active: bool,
    pub comment: Option<String>,
    pub has_secret: bool,
    pub date_created: DateTime<Utc>,
}

impl TemplateView {
    pub fn new(template: &AccountTemplate, registry: &ChoiceRegistry) -> Self {
        Self {
            id: template.id.clone(),
            org_id: template.org_id.clone(),
            name: template.name.clone(),
            username: template.username.clone(),
            secret_type: registry
                .labeled(template.secret_type.as_str(), template.secret_type.label()),
            privileged: template.privileged,
            is_active: template.is_active,
            comment: template.comment.clone(),
            has_secret: template.secret.is_some(),
            date_created: template.date_created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::test_support::sample_account;

    #[test]
    fn test_secret_hidden_unless_revealed() {
        let account = sample_account("x1", "a1", "root");
        let registry = ChoiceRegistry::new();

        let hidden = serde_json::to_value(AccountView::new(&account, &registry, false)).unwrap();
        assert!(hidden.get("secret").is_none());
        assert_eq!(hidden["has_secret"], true);
        assert_eq!(hidden["secret_type"]["label"], "Password");

        let shown = AccountView::new(&account, &registry, true);
        assert_eq!(shown.secret, account.secret);
    }
}
