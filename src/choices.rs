//! Closed choice enums and the display-label extension registry.
//!
//! Core logic only ever sees the enums. Extra display labels (for example
//! site-specific names for platform types) live in a [`ChoiceRegistry`]
//! which is consulted when rendering views, never during validation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// Declares a closed string enum with serde names, labels and `FromStr`.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => ($value:literal, $label:literal)),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            /// The built-in display label.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = WardenError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err(WardenError::validation(format!(
                        "Invalid {} '{}'. Valid values: {}",
                        stringify!($name),
                        other,
                        [$($value),+].join(", ")
                    ))),
                }
            }
        }
    };
}

choice_enum! {
    /// Kind of credential an account holds.
    SecretType {
        Password => ("password", "Password"),
        SshKey => ("ssh_key", "SSH key"),
        AccessKey => ("access_key", "Access key"),
        Token => ("token", "Token"),
        ApiKey => ("api_key", "API key"),
    }
}

choice_enum! {
    /// Where an account came from.
    Source {
        Manual => ("manual", "Manual"),
        Template => ("template", "Template"),
        Collected => ("collected", "Collected"),
    }
}

choice_enum! {
    /// Conflict policy (`on_invalid`) applied when a candidate collides.
    OnInvalid {
        Error => ("error", "Failed"),
        Skip => ("skip", "Skip"),
        Update => ("update", "Update"),
    }
}

choice_enum! {
    /// Asset category.
    Category {
        Host => ("host", "Host"),
        Device => ("device", "Device"),
        Database => ("database", "Database"),
        Cloud => ("cloud", "Cloud service"),
        Web => ("web", "Web"),
    }
}

choice_enum! {
    /// Asset type; every type belongs to exactly one category.
    AssetType {
        Linux => ("linux", "Linux"),
        Windows => ("windows", "Windows"),
        Unix => ("unix", "Unix"),
        Other => ("other", "Other"),
        General => ("general", "General"),
        Switch => ("switch", "Switch"),
        Router => ("router", "Router"),
        Firewall => ("firewall", "Firewall"),
        Mysql => ("mysql", "MySQL"),
        Mariadb => ("mariadb", "MariaDB"),
        Postgresql => ("postgresql", "PostgreSQL"),
        Oracle => ("oracle", "Oracle"),
        Sqlserver => ("sqlserver", "SQL Server"),
        Mongodb => ("mongodb", "MongoDB"),
        Redis => ("redis", "Redis"),
        Public => ("public", "Public cloud"),
        Private => ("private", "Private cloud"),
        K8s => ("k8s", "Kubernetes"),
        Website => ("website", "Website"),
    }
}

choice_enum! {
    /// Platform character set.
    Charset {
        Utf8 => ("utf-8", "UTF-8"),
        Gbk => ("gbk", "GBK"),
    }
}

choice_enum! {
    /// How a platform switches user.
    SuMethod {
        Sudo => ("sudo", "sudo su -"),
        Su => ("su", "su - "),
        Enable => ("enable", "enable"),
        Super => ("super", "super 15"),
        SuperLevel => ("super_level", "super level 15"),
    }
}

impl Default for SecretType {
    fn default() -> Self {
        SecretType::Password
    }
}

impl Default for OnInvalid {
    fn default() -> Self {
        OnInvalid::Error
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Utf8
    }
}

impl AssetType {
    /// The category this type belongs to.
    pub fn category(&self) -> Category {
        use AssetType::*;
        match self {
            Linux | Windows | Unix | Other => Category::Host,
            General | Switch | Router | Firewall => Category::Device,
            Mysql | Mariadb | Postgresql | Oracle | Sqlserver | Mongodb | Redis => {
                Category::Database
            }
            Public | Private | K8s => Category::Cloud,
            Website => Category::Web,
        }
    }
}

/// Secret types a protocol can authenticate with when the platform does not
/// say otherwise. Unknown protocols fall back to passwords.
pub fn protocol_secret_types(protocol: &str) -> &'static [SecretType] {
    match protocol {
        "ssh" | "sftp" => &[SecretType::Password, SecretType::SshKey],
        "k8s" => &[SecretType::Token],
        "http" | "https" => &[SecretType::Password, SecretType::ApiKey],
        "s3" => &[SecretType::AccessKey],
        _ => &[SecretType::Password],
    }
}

/// A `{value, label}` pair as rendered to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledChoice {
    pub value: String,
    pub label: String,
}

/// Extension registry mapping extra variants (or overridden values) to
/// display labels.
#[derive(Debug, Clone, Default)]
pub struct ChoiceRegistry {
    extra: BTreeMap<String, String>,
}

impl ChoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display label. Later registrations replace earlier ones.
    pub fn register(&mut self, value: impl Into<String>, label: impl Into<String>) {
        self.extra.insert(value.into(), label.into());
    }

    /// Render a value, preferring a registered label over the built-in one.
    pub fn labeled(&self, value: &str, builtin: &str) -> LabeledChoice {
        let label = self
            .extra
            .get(value)
            .cloned()
            .unwrap_or_else(|| builtin.to_string());
        LabeledChoice {
            value: value.to_string(),
            label,
        }
    }

    /// Choice list for asset types: built-in types (optionally filtered by
    /// category) followed by registered extra variants not already built in.
    pub fn type_choices(&self, category: Option<Category>) -> Vec<LabeledChoice> {
        let mut choices: Vec<LabeledChoice> = AssetType::ALL
            .iter()
            .filter(|t| category.is_none_or(|c| t.category() == c))
            .map(|t| self.labeled(t.as_str(), t.label()))
            .collect();

        if category.is_none() {
            for (value, label) in &self.extra {
                if value.parse::<AssetType>().is_err() {
                    choices.push(LabeledChoice {
                        value: value.clone(),
                        label: label.clone(),
                    });
                }
            }
        }
        choices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("ssh_key".parse::<SecretType>().unwrap(), SecretType::SshKey);
        assert_eq!(OnInvalid::Update.to_string(), "update");
        assert!("bogus".parse::<OnInvalid>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_values() {
        let json = serde_json::to_string(&SecretType::AccessKey).unwrap();
        assert_eq!(json, "\"access_key\"");
        let charset: Charset = serde_json::from_str("\"utf-8\"").unwrap();
        assert_eq!(charset, Charset::Utf8);
    }

    #[test]
    fn test_type_category() {
        assert_eq!(AssetType::Linux.category(), Category::Host);
        assert_eq!(AssetType::Redis.category(), Category::Database);
        assert_eq!(AssetType::K8s.category(), Category::Cloud);
    }

    #[test]
    fn test_registry_overrides_and_extends() {
        let mut registry = ChoiceRegistry::new();
        registry.register("linux", "Linux server");
        registry.register("mainframe", "Mainframe");

        let linux = registry.labeled("linux", AssetType::Linux.label());
        assert_eq!(linux.label, "Linux server");

        let all = registry.type_choices(None);
        assert!(all.iter().any(|c| c.value == "mainframe"));
        assert_eq!(all.iter().filter(|c| c.value == "linux").count(), 1);

        let databases = registry.type_choices(Some(Category::Database));
        assert!(databases.iter().all(|c| c.value != "mainframe"));
        assert!(databases.iter().any(|c| c.value == "redis"));
    }
}
