//! Configuration file loading and saving.

use std::path::{Path, PathBuf};

use super::types::Config;
use crate::error::{Result, WardenError};

impl Config {
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config/warden/warden.kdl"))
    }

    /// Candidate config files, highest priority first: the working
    /// directory, `~/.config`, the platform config and data dirs, `~/warden`.
    fn config_candidates() -> Vec<PathBuf> {
        let home_config = Self::home_config_path();
        let mut paths = vec![PathBuf::from("warden.kdl")];
        paths.extend(home_config.clone());
        paths.extend(
            dirs::config_dir()
                .map(|d| d.join("warden/warden.kdl"))
                .filter(|p| Some(p) != home_config.as_ref()),
        );
        paths.extend(dirs::data_dir().map(|d| d.join("warden/warden.kdl")));
        paths.extend(dirs::home_dir().map(|h| h.join("warden/warden.kdl")));
        paths
    }

    /// First candidate config file that exists.
    pub fn find_existing_config() -> Option<PathBuf> {
        Self::config_candidates().into_iter().find(|p| p.exists())
    }

    /// Where `config generate` writes when no path is given.
    pub fn default_config_path() -> PathBuf {
        Self::home_config_path().unwrap_or_else(|| PathBuf::from("warden.kdl"))
    }

    /// Parse configuration from KDL text.
    pub fn parse(content: &str) -> Result<Self> {
        knuffel::parse::<Config>("warden.kdl", content).map_err(|e| WardenError::config(e.to_string()))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from warden.kdl, searching multiple locations
    pub fn load() -> Result<Self> {
        match Self::find_existing_config() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load_from_path(&path)
            }
            None => Ok(Config::default()),
        }
    }

    /// Generate a config file with default values
    pub fn generate_config_file(path: Option<PathBuf>, overwrite: bool) -> Result<PathBuf> {
        let config_path = path.unwrap_or_else(Self::default_config_path);

        if config_path.exists() && !overwrite {
            return Err(WardenError::config(format!(
                "Config file already exists at: {}. Use --overwrite to replace it.",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let kdl_content = r#"// Global defaults
// on_invalid is the conflict policy when a payload does not name one: error, skip or update
// log_format is "pretty" or "json"; RUST_LOG overrides log_level
defaults data_path="~/.local/share/warden" on_invalid="error" log_level="info" log_format="pretty" org="Default"

// Extra display labels for choice values
// label "linux" "Linux server"
"#;

        std::fs::write(&config_path, kdl_content)?;
        Ok(config_path)
    }

    /// Serialize config to KDL format
    pub fn to_kdl(&self) -> String {
        let mut output = String::new();

        output.push_str("// warden configuration file\n\n");

        output.push_str("defaults");
        if let Some(d) = &self.defaults {
            if let Some(data_path) = &d.data_path {
                output.push_str(&format!(" data_path=\"{}\"", data_path));
            }
            if let Some(on_invalid) = &d.on_invalid {
                output.push_str(&format!(" on_invalid=\"{}\"", on_invalid));
            }
            if let Some(log_level) = &d.log_level {
                output.push_str(&format!(" log_level=\"{}\"", log_level));
            }
            if let Some(log_format) = &d.log_format {
                output.push_str(&format!(" log_format=\"{}\"", log_format));
            }
            if let Some(org) = &d.org {
                output.push_str(&format!(" org=\"{}\"", org));
            }
        }
        output.push('\n');

        if !self.labels.is_empty() {
            output.push('\n');
        }
        for label in &self.labels {
            output.push_str(&format!("label \"{}\" \"{}\"\n", label.value, label.label));
        }

        output
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_kdl())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choices::OnInvalid;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            defaults data_path="/srv/warden" on_invalid="update" log_format="json" org="Acme"
            label "linux" "Linux server"
            label "mainframe" "Mainframe"
            "#,
        )
        .unwrap();

        assert_eq!(config.on_invalid().unwrap(), OnInvalid::Update);
        assert!(config.log_json());
        assert_eq!(config.org(), "Acme");
        assert_eq!(config.labels.len(), 2);
        let registry = config.labels();
        assert_eq!(registry.labeled("linux", "Linux").label, "Linux server");
    }

    #[test]
    fn test_to_kdl_roundtrip() {
        let mut config = Config::default();
        config.set_default("org", "Acme").unwrap();
        config.set_default("on_invalid", "skip").unwrap();
        config.set_label("linux", "Linux server");

        let reparsed = Config::parse(&config.to_kdl()).unwrap();
        assert_eq!(reparsed.org(), "Acme");
        assert_eq!(reparsed.on_invalid().unwrap(), OnInvalid::Skip);
        assert_eq!(reparsed.labels, config.labels);
    }

    #[test]
    fn test_generated_file_parses() {
        let path = std::env::temp_dir().join(format!("warden-{}.kdl", uuid::Uuid::new_v4()));
        Config::generate_config_file(Some(path.clone()), false).unwrap();
        assert!(Config::generate_config_file(Some(path.clone()), false).is_err());

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.on_invalid().unwrap(), OnInvalid::Error);
        assert_eq!(config.org(), "Default");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_search_starts_in_working_directory() {
        let candidates = Config::config_candidates();
        assert_eq!(candidates[0], PathBuf::from("warden.kdl"));
        assert!(candidates.iter().all(|p| p.ends_with("warden.kdl")));
        let unique: std::collections::BTreeSet<_> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn test_invalid_policy_is_config_error() {
        let config = Config::parse(r#"defaults on_invalid="maybe""#).unwrap();
        assert!(matches!(config.on_invalid(), Err(WardenError::Config(_))));
    }
}
