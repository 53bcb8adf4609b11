//! Platform validation and creation.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;

use crate::choices::{AssetType, Category, Charset, SuMethod, protocol_secret_types};
use crate::db::{Automation, CustomField, Platform, Protocol, RecordStore};
use crate::error::{Result, WardenError};

static FIELD_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"));

const CUSTOM_FIELD_TYPES: &[&str] = &["str", "text", "int", "float", "bool", "choice"];

/// Feature switches a `(category, type)` pair allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeConstraints {
    pub domain_enabled: bool,
    pub su_enabled: bool,
    pub ansible_enabled: bool,
    pub su_methods: &'static [SuMethod],
}

const HOST_SU: &[SuMethod] = &[SuMethod::Sudo, SuMethod::Su];
const DEVICE_SU: &[SuMethod] = &[SuMethod::Enable, SuMethod::Super, SuMethod::SuperLevel];

/// Constraints table keyed by asset type (the type fixes the category).
pub fn constraints_for(asset_type: AssetType) -> TypeConstraints {
    use AssetType::*;
    let (domain_enabled, su_enabled, ansible_enabled, su_methods) = match asset_type {
        Linux | Unix => (true, true, true, HOST_SU),
        Windows => (true, false, true, &[][..]),
        Other => (true, false, false, &[][..]),
        General | Switch | Router | Firewall => (true, true, false, DEVICE_SU),
        Mysql | Mariadb | Postgresql | Oracle | Sqlserver | Mongodb | Redis => {
            (true, false, false, &[][..])
        }
        Public | Private | K8s => (false, false, false, &[][..]),
        Website => (false, false, false, &[][..]),
    };
    TypeConstraints {
        domain_enabled,
        su_enabled,
        ansible_enabled,
        su_methods,
    }
}

/// A platform as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformPayload {
    pub name: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default)]
    pub charset: Charset,
    #[serde(default)]
    pub domain_enabled: bool,
    #[serde(default)]
    pub su_enabled: bool,
    #[serde(default)]
    pub su_method: Option<SuMethod>,
    #[serde(default)]
    pub automation: Automation,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub comment: String,
}

fn validate_platform_protocols(mut protocols: Vec<Protocol>) -> Result<Vec<Protocol>> {
    if protocols.is_empty() {
        return Err(WardenError::validation("Protocols is required"));
    }
    for (i, p) in protocols.iter().enumerate() {
        if p.port == 0 {
            return Err(WardenError::range(format!(
                "{}: port out of range (1-65535)",
                p.name
            )));
        }
        if protocols[..i].iter().any(|q| q.name == p.name) {
            return Err(WardenError::validation(format!(
                "Duplicate protocol: {}",
                p.name
            )));
        }
    }
    for p in &mut protocols {
        if p.secret_types.is_empty() {
            p.secret_types = protocol_secret_types(&p.name).iter().copied().collect();
        }
    }
    if !protocols.iter().any(|p| p.primary) {
        protocols[0].primary = true;
    }
    Ok(protocols)
}

fn validate_custom_fields(fields: &[CustomField]) -> Result<()> {
    for field in fields {
        if !FIELD_NAME_RE.is_match(&field.name) || field.name.len() > 128 {
            return Err(WardenError::validation(format!(
                "custom_fields: invalid name '{}'",
                field.name
            )));
        }
        if field.label.is_empty() || field.label.len() > 128 {
            return Err(WardenError::validation(format!(
                "custom_fields.{}: label must be 1-128 characters",
                field.name
            )));
        }
        if field.default.len() > 1024 || field.help_text.len() > 1024 {
            return Err(WardenError::validation(format!(
                "custom_fields.{}: default and help_text are limited to 1024 characters",
                field.name
            )));
        }
        if !CUSTOM_FIELD_TYPES.contains(&field.field_type.as_str()) {
            return Err(WardenError::validation(format!(
                "custom_fields.{}: invalid type '{}'. Valid values: {}",
                field.name,
                field.field_type,
                CUSTOM_FIELD_TYPES.join(", ")
            )));
        }
        if field.field_type == "choice" && field.choices.is_empty() {
            return Err(WardenError::validation(format!(
                "custom_fields.{}: choice fields need choices",
                field.name
            )));
        }
    }
    Ok(())
}

/// Validate a payload into a platform record. Switches the type does not
/// allow are turned off rather than rejected.
pub fn build_platform(payload: PlatformPayload) -> Result<Platform> {
    if payload.asset_type.category() != payload.category {
        return Err(WardenError::validation(format!(
            "type '{}' does not belong to category '{}'",
            payload.asset_type, payload.category
        )));
    }
    let constraints = constraints_for(payload.asset_type);
    let protocols = validate_platform_protocols(payload.protocols)?;
    validate_custom_fields(&payload.custom_fields)?;

    let su_enabled = payload.su_enabled && constraints.su_enabled;
    let su_method = if su_enabled {
        let method = payload
            .su_method
            .or_else(|| constraints.su_methods.first().copied());
        if let Some(m) = method
            && !constraints.su_methods.contains(&m)
        {
            return Err(WardenError::validation(format!(
                "su_method '{}' is not available for type '{}'",
                m, payload.asset_type
            )));
        }
        method
    } else {
        None
    };

    let mut automation = payload.automation;
    automation.ansible_enabled = automation.ansible_enabled && constraints.ansible_enabled;

    Ok(Platform {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        category: payload.category,
        asset_type: payload.asset_type,
        charset: payload.charset,
        domain_enabled: payload.domain_enabled && constraints.domain_enabled,
        su_enabled,
        su_method,
        automation,
        protocols,
        custom_fields: payload.custom_fields,
        comment: payload.comment,
        date_created: Utc::now(),
    })
}

/// Validate and store a new platform.
pub fn create_platform<S: RecordStore>(store: &S, payload: PlatformPayload) -> Result<Platform> {
    if payload.name.trim().is_empty() {
        return Err(WardenError::validation("name: This field is required."));
    }
    let platform = build_platform(payload)?;
    store.insert_platform(&platform).map_err(|e| {
        if e.is_unique_violation() {
            WardenError::conflict(format!("Platform name already exists: {}", platform.name))
        } else {
            e
        }
    })?;
    tracing::info!(platform = %platform.id, name = %platform.name, "platform created");
    Ok(platform)
}
