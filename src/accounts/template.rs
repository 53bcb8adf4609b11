//! Template resolution: turn an account template into default field values.

use serde_json::Value;

use crate::db::{AccountTemplate, RecordStore};
use crate::error::{Result, WardenError};
use crate::fields::{AUDIT_FIELDS, FieldSpec, FieldValues, TEMPLATE_FIELDS, declares};

/// A template given either by id or already loaded.
#[derive(Debug, Clone, Copy)]
pub enum TemplateRef<'a> {
    Id(&'a str),
    Loaded(&'a AccountTemplate),
}

/// Default values taken from a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub template_id: String,
    pub values: FieldValues,
}

impl AccountTemplate {
    /// Value of one declared template field; `Null` when unset or unknown.
    pub fn field_value(&self, name: &str) -> Value {
        match name {
            "id" => Value::from(self.id.as_str()),
            "org_id" => Value::from(self.org_id.as_str()),
            "name" => Value::from(self.name.as_str()),
            "username" => Value::from(self.username.as_str()),
            "secret" => self.secret.as_deref().map(Value::from).unwrap_or(Value::Null),
            "secret_type" => Value::from(self.secret_type.as_str()),
            "privileged" => Value::from(self.privileged),
            "is_active" => Value::from(self.is_active),
            "comment" => self.comment.as_deref().map(Value::from).unwrap_or(Value::Null),
            "date_created" => Value::from(self.date_created.to_rfc3339()),
            "date_updated" => Value::from(self.date_updated.to_rfc3339()),
            _ => Value::Null,
        }
    }
}

/// Load a template and copy its non-null fields that `target` declares,
/// leaving out identity and audit fields.
///
/// The result is meant to sit underneath the request: see
/// [`merge_defaults`](crate::fields::merge_defaults).
pub fn resolve<S: RecordStore>(
    store: &S,
    template: TemplateRef<'_>,
    target: &[FieldSpec],
) -> Result<ResolvedTemplate> {
    let loaded;
    let template = match template {
        TemplateRef::Loaded(t) => t,
        TemplateRef::Id(id) => {
            loaded = store
                .get_template(id)?
                .ok_or_else(|| WardenError::not_found(format!("Template not found: {}", id)))?;
            &loaded
        }
    };

    let mut values = FieldValues::new();
    for spec in TEMPLATE_FIELDS {
        if AUDIT_FIELDS.contains(&spec.name) || !declares(target, spec.name) {
            continue;
        }
        let value = template.field_value(spec.name);
        if value.is_null() {
            continue;
        }
        values.insert(spec.name.to_string(), value);
    }

    tracing::debug!(template = %template.id, fields = values.len(), "resolved account template");
    Ok(ResolvedTemplate {
        template_id: template.id.clone(),
        values,
    })
}
