//! Declared field schemas and default merging.
//!
//! Each record kind that accepts payload fields declares an ordered list of
//! `(name, kind)` pairs. Template defaults and request values are merged over
//! that list instead of by inspecting structs at runtime.

use serde_json::{Map, Value};

use crate::error::{Result, WardenError};

/// A payload as a JSON field map.
pub type FieldValues = Map<String, Value>;

/// Value kind of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Secret,
    Bool,
    Int,
    Choice,
    Reference,
    Timestamp,
}

impl FieldKind {
    /// Whether a JSON value is acceptable for this kind. `null` is always
    /// accepted and means "not supplied".
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldKind::Bool, Value::Bool(_)) => true,
            (FieldKind::Int, Value::Number(n)) => n.is_i64(),
            (
                FieldKind::Text
                | FieldKind::Secret
                | FieldKind::Choice
                | FieldKind::Reference
                | FieldKind::Timestamp,
                Value::String(_),
            ) => true,
            _ => false,
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

/// Fields an account create/update payload accepts.
pub const ACCOUNT_FIELDS: &[FieldSpec] = &[
    field("name", FieldKind::Text),
    field("username", FieldKind::Text),
    field("secret", FieldKind::Secret),
    field("secret_type", FieldKind::Choice),
    field("privileged", FieldKind::Bool),
    field("is_active", FieldKind::Bool),
    field("comment", FieldKind::Text),
    field("su_from", FieldKind::Reference),
    field("asset", FieldKind::Reference),
];

/// Fields the bulk account payload accepts besides `assets`.
pub const BULK_ACCOUNT_FIELDS: &[FieldSpec] = &[
    field("name", FieldKind::Text),
    field("username", FieldKind::Text),
    field("secret", FieldKind::Secret),
    field("secret_type", FieldKind::Choice),
    field("privileged", FieldKind::Bool),
    field("is_active", FieldKind::Bool),
    field("comment", FieldKind::Text),
];

/// Every column of an account template.
pub const TEMPLATE_FIELDS: &[FieldSpec] = &[
    field("id", FieldKind::Reference),
    field("name", FieldKind::Text),
    field("username", FieldKind::Text),
    field("secret", FieldKind::Secret),
    field("secret_type", FieldKind::Choice),
    field("privileged", FieldKind::Bool),
    field("is_active", FieldKind::Bool),
    field("comment", FieldKind::Text),
    field("date_created", FieldKind::Timestamp),
    field("date_updated", FieldKind::Timestamp),
    field("org_id", FieldKind::Reference),
];

/// Identity and audit fields never copied out of a template.
pub const AUDIT_FIELDS: &[&str] = &["id", "date_created", "date_updated", "org_id"];

/// Whether `schema` declares a field called `name`.
pub fn declares(schema: &[FieldSpec], name: &str) -> bool {
    schema.iter().any(|f| f.name == name)
}

/// Overlay `request` on top of `defaults` for the fields in `schema`.
///
/// Request values always win, including an explicit `null`. Default values
/// only fill declared fields the request left out. Request keys outside the
/// schema are kept untouched.
pub fn merge_defaults(schema: &[FieldSpec], defaults: &FieldValues, request: &FieldValues) -> FieldValues {
    let mut merged = request.clone();
    for spec in schema {
        if merged.contains_key(spec.name) {
            continue;
        }
        if let Some(value) = defaults.get(spec.name)
            && !value.is_null()
        {
            merged.insert(spec.name.to_string(), value.clone());
        }
    }
    merged
}

/// Reject declared fields whose value has the wrong JSON type.
pub fn check_kinds(schema: &[FieldSpec], values: &FieldValues) -> Result<()> {
    for spec in schema {
        if let Some(value) = values.get(spec.name)
            && !spec.kind.accepts(value)
        {
            return Err(WardenError::validation(format!(
                "{}: expected {:?} value, got {}",
                spec.name, spec.kind, value
            )));
        }
    }
    Ok(())
}
