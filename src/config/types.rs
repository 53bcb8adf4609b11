//! Configuration type definitions.

use knuffel::Decode;
use std::path::PathBuf;

use crate::choices::{ChoiceRegistry, OnInvalid};
use crate::error::WardenError;

/// Setting names accepted by `config get` / `config set`.
pub const SETTINGS: &[&str] = &["data_path", "on_invalid", "log_level", "log_format", "org"];

/// Expand tilde (~) prefix to the user's home directory.
/// Handles both "~" alone and "~/path/to/something" patterns.
pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Main configuration structure parsed from warden.kdl.
#[derive(Debug, Decode, Clone, Default)]
pub struct Config {
    #[knuffel(child)]
    pub defaults: Option<Defaults>,

    #[knuffel(children(name = "label"))]
    pub labels: Vec<LabelConfig>,
}

/// Default settings for warden.
#[derive(Debug, Decode, Clone, Default)]
pub struct Defaults {
    #[knuffel(property(name = "data_path"))]
    pub data_path: Option<String>,

    /// Conflict policy for payloads that do not name one.
    #[knuffel(property(name = "on_invalid"))]
    pub on_invalid: Option<String>,

    #[knuffel(property(name = "log_level"))]
    pub log_level: Option<String>,

    /// "pretty" or "json"
    #[knuffel(property(name = "log_format"))]
    pub log_format: Option<String>,

    /// Organization name; the root of the node tree.
    #[knuffel(property)]
    pub org: Option<String>,
}

/// An extra display label: `label "value" "Label"`.
#[derive(Debug, Decode, Clone, PartialEq, Eq)]
pub struct LabelConfig {
    #[knuffel(argument)]
    pub value: String,

    #[knuffel(argument)]
    pub label: String,
}

impl Config {
    /// Get the data directory, defaulting to the platform data dir.
    /// Expands ~ to the user's home directory if present.
    pub fn data_path(&self) -> PathBuf {
        self.defaults
            .as_ref()
            .and_then(|d| d.data_path.clone())
            .map(|p| expand_tilde(&p))
            .or_else(|| dirs::data_dir().map(|d| d.join("warden")))
            .unwrap_or_else(|| PathBuf::from("./.warden"))
    }

    /// Get the path to the database file
    pub fn db_path(&self) -> PathBuf {
        self.data_path().join("warden.db")
    }

    /// Default conflict policy, "error" unless configured.
    pub fn on_invalid(&self) -> crate::error::Result<OnInvalid> {
        match self.defaults.as_ref().and_then(|d| d.on_invalid.as_deref()) {
            Some(value) => value
                .parse()
                .map_err(|e: WardenError| WardenError::config(e.to_string())),
            None => Ok(OnInvalid::default()),
        }
    }

    /// Log filter directive, defaulting to "info"
    pub fn log_level(&self) -> String {
        self.defaults
            .as_ref()
            .and_then(|d| d.log_level.clone())
            .unwrap_or_else(|| "info".to_string())
    }

    /// Whether logs are written as JSON lines.
    pub fn log_json(&self) -> bool {
        self.defaults
            .as_ref()
            .and_then(|d| d.log_format.as_deref())
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }

    /// Organization name, defaulting to "Default"
    pub fn org(&self) -> String {
        self.defaults
            .as_ref()
            .and_then(|d| d.org.clone())
            .unwrap_or_else(|| "Default".to_string())
    }

    /// Display-label registry built from `label` entries.
    pub fn labels(&self) -> ChoiceRegistry {
        let mut registry = ChoiceRegistry::new();
        for entry in &self.labels {
            registry.register(entry.value.clone(), entry.label.clone());
        }
        registry
    }

    /// Update a default setting
    pub fn set_default(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        let defaults = self.defaults.get_or_insert(Defaults::default());
        match key {
            "data_path" => defaults.data_path = Some(value.to_string()),
            "on_invalid" => {
                value.parse::<OnInvalid>()?;
                defaults.on_invalid = Some(value.to_string())
            }
            "log_level" => defaults.log_level = Some(value.to_string()),
            "log_format" => {
                if !matches!(value, "pretty" | "json") {
                    return Err(WardenError::config(format!(
                        "Invalid log_format '{}'. Valid values: pretty, json",
                        value
                    )));
                }
                defaults.log_format = Some(value.to_string())
            }
            "org" => defaults.org = Some(value.to_string()),
            _ => return Err(unknown_setting(key)),
        }
        Ok(())
    }

    /// Get a default setting value as string
    pub fn get_default(&self, key: &str) -> crate::error::Result<String> {
        match key {
            "data_path" => Ok(self.data_path().to_string_lossy().to_string()),
            "on_invalid" => Ok(self.on_invalid()?.to_string()),
            "log_level" => Ok(self.log_level()),
            "log_format" => Ok(if self.log_json() { "json" } else { "pretty" }.to_string()),
            "org" => Ok(self.org()),
            _ => Err(unknown_setting(key)),
        }
    }

    /// Add or replace a display label
    pub fn set_label(&mut self, value: &str, label: &str) {
        self.labels.retain(|l| l.value != value);
        self.labels.push(LabelConfig {
            value: value.to_string(),
            label: label.to_string(),
        });
    }
}

fn unknown_setting(key: &str) -> WardenError {
    WardenError::config(format!(
        "Unknown setting: {}. Valid settings: {}",
        key,
        SETTINGS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.on_invalid().unwrap(), OnInvalid::Error);
        assert_eq!(config.log_level(), "info");
        assert!(!config.log_json());
        assert_eq!(config.org(), "Default");
        assert!(config.db_path().ends_with("warden.db"));
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set_default("on_invalid", "skip").unwrap();
        config.set_default("data_path", "/tmp/warden-test").unwrap();
        assert_eq!(config.get_default("on_invalid").unwrap(), "skip");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/warden-test/warden.db"));

        assert!(config.set_default("on_invalid", "explode").is_err());
        assert!(config.set_default("log_format", "xml").is_err());
        assert!(config.get_default("editor").is_err());
    }

    #[test]
    fn test_decodes_defaults_and_labels() {
        let config: Config = knuffel::parse(
            "warden.kdl",
            r#"
            defaults on_invalid="skip" org="Acme"
            label "mainframe" "Mainframe"
            "#,
        )
        .unwrap();
        let defaults = config.defaults.as_ref().unwrap();
        assert_eq!(defaults.on_invalid.as_deref(), Some("skip"));
        assert_eq!(defaults.data_path, None);
        assert_eq!(
            config.labels,
            vec![LabelConfig {
                value: "mainframe".to_string(),
                label: "Mainframe".to_string(),
            }]
        );
        assert_eq!(config.on_invalid().unwrap(), OnInvalid::Skip);
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x"), home.join("x"));
        }
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
    }
}
