//! Protocol list validation for assets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::{Platform, Protocol};
use crate::error::{Result, WardenError};

/// A `(name, port)` entry as submitted for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolEntry {
    pub name: String,
    /// Wider than a port so out-of-range input reaches validation.
    #[serde(default)]
    pub port: i64,
    #[serde(default)]
    pub primary: bool,
}

impl ProtocolEntry {
    pub fn new(name: impl Into<String>, port: i64) -> Self {
        Self {
            name: name.into(),
            port,
            primary: false,
        }
    }

    /// Turn a validated entry into a stored binding.
    pub fn to_binding(&self) -> Result<Protocol> {
        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| port_error(&self.name))?;
        Ok(Protocol {
            name: self.name.clone(),
            port,
            primary: self.primary,
            required: false,
            default: false,
            secret_types: Default::default(),
        })
    }
}

impl From<&Protocol> for ProtocolEntry {
    fn from(p: &Protocol) -> Self {
        Self {
            name: p.name.clone(),
            port: i64::from(p.port),
            primary: p.primary,
        }
    }
}

/// `name/port`, the form used in file imports.
impl fmt::Display for ProtocolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.port)
    }
}

impl FromStr for ProtocolEntry {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, port) = s.split_once('/').ok_or_else(|| {
            WardenError::validation(format!("Invalid protocol '{}'. Expected name/port", s))
        })?;
        let port = port
            .trim()
            .parse::<i64>()
            .map_err(|_| WardenError::validation(format!("Invalid port in protocol '{}'", s)))?;
        Ok(Self::new(name.trim(), port))
    }
}

/// Protocol names a platform insists on or suggests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolConstraints {
    pub required: Vec<String>,
    pub default: Vec<ProtocolEntry>,
}

impl ProtocolConstraints {
    /// Primary platform protocols count as required.
    pub fn from_platform(platform: &Platform) -> Self {
        Self {
            required: platform
                .protocols
                .iter()
                .filter(|p| p.required || p.primary)
                .map(|p| p.name.clone())
                .collect(),
            default: platform
                .protocols
                .iter()
                .filter(|p| p.default)
                .map(|p| ProtocolEntry::new(p.name.clone(), i64::from(p.port)))
                .collect(),
        }
    }

    /// Entries used when a payload carries no protocol list at all:
    /// required protocols first, then defaults, without repeats.
    pub fn defaults_for(&self, platform: &Platform) -> Vec<ProtocolEntry> {
        let mut entries: Vec<ProtocolEntry> = Vec::new();
        let required = platform
            .protocols
            .iter()
            .filter(|p| self.required.contains(&p.name))
            .map(|p| ProtocolEntry::new(p.name.clone(), i64::from(p.port)));
        for entry in required.chain(self.default.iter().cloned()) {
            if !entries.iter().any(|e| e.name == entry.name) {
                entries.push(entry);
            }
        }
        entries
    }
}

fn port_error(name: &str) -> WardenError {
    WardenError::range(format!("{}: port out of range (1-65535)", name))
}

/// Deduplicate and validate an asset's protocol list.
///
/// Later entries with the same name replace earlier ones but keep the
/// earlier position. Every submitted port must be within 1..=65535, all
/// required names must be present (reported together), and the first entry
/// becomes primary when none is.
pub fn validate_protocols(
    entries: &[ProtocolEntry],
    constraints: &ProtocolConstraints,
) -> Result<Vec<ProtocolEntry>> {
    let mut deduped: Vec<ProtocolEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !(1..=65535).contains(&entry.port) {
            return Err(port_error(&entry.name));
        }
        match deduped.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry.clone(),
            None => deduped.push(entry.clone()),
        }
    }

    let missing: Vec<String> = constraints
        .required
        .iter()
        .filter(|name| !deduped.iter().any(|e| &e.name == *name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(WardenError::MissingProtocol(missing));
    }

    if !deduped.iter().any(|e| e.primary)
        && let Some(first) = deduped.first_mut()
    {
        first.primary = true;
    }
    Ok(deduped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none() -> ProtocolConstraints {
        ProtocolConstraints::default()
    }

    #[test]
    fn test_duplicate_name_last_port_wins_and_is_promoted() {
        let entries = vec![ProtocolEntry::new("rdp", 3389), ProtocolEntry::new("rdp", 3390)];
        let validated = validate_protocols(&entries, &none()).unwrap();

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0].port, 3390);
        assert!(validated[0].primary);
    }

    #[test]
    fn test_port_out_of_range_names_protocol() {
        let entries = vec![ProtocolEntry::new("rdp", 70000)];
        let err = validate_protocols(&entries, &none()).unwrap_err();
        assert!(matches!(err, WardenError::Range(_)));
        assert!(err.to_string().contains("rdp"));

        let entries = vec![ProtocolEntry::new("ssh", 0)];
        assert!(validate_protocols(&entries, &none()).is_err());
    }

    #[test]
    fn test_missing_required_listed_together() {
        let constraints = ProtocolConstraints {
            required: vec!["ssh".into(), "sftp".into(), "rdp".into()],
            default: Vec::new(),
        };
        let err = validate_protocols(&[ProtocolEntry::new("rdp", 3389)], &constraints).unwrap_err();
        match err {
            WardenError::MissingProtocol(names) => assert_eq!(names, vec!["ssh", "sftp"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let entries = vec![
            ProtocolEntry::new("ssh", 22),
            ProtocolEntry::new("rdp", 3389),
            ProtocolEntry::new("ssh", 2222),
        ];
        let validated = validate_protocols(&entries, &none()).unwrap();
        let names: Vec<_> = validated.iter().map(|e| e.to_string()).collect();
        assert_eq!(names, vec!["ssh/2222", "rdp/3389"]);
        assert!(validated[0].primary);
        assert!(!validated[1].primary);
    }

    #[test]
    fn test_existing_primary_is_respected() {
        let mut rdp = ProtocolEntry::new("rdp", 3389);
        rdp.primary = true;
        let validated = validate_protocols(&[ProtocolEntry::new("ssh", 22), rdp], &none()).unwrap();
        assert!(!validated[0].primary);
        assert!(validated[1].primary);
    }

    #[test]
    fn test_validation_is_idempotent() {
        let constraints = ProtocolConstraints {
            required: vec!["ssh".into()],
            default: Vec::new(),
        };
        let entries = vec![
            ProtocolEntry::new("ssh", 22),
            ProtocolEntry::new("sftp", 22),
            ProtocolEntry::new("ssh", 2022),
        ];
        let once = validate_protocols(&entries, &constraints).unwrap();
        let twice = validate_protocols(&once, &constraints).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_name_port() {
        let entry: ProtocolEntry = "ssh/22".parse().unwrap();
        assert_eq!(entry, ProtocolEntry::new("ssh", 22));
        assert!("ssh".parse::<ProtocolEntry>().is_err());
        assert!("ssh/abc".parse::<ProtocolEntry>().is_err());
    }

    #[test]
    fn test_to_binding() {
        let binding = ProtocolEntry::new("ssh", 22).to_binding().unwrap();
        assert_eq!(binding.port, 22);
        assert!(ProtocolEntry::new("ssh", 70000).to_binding().is_err());
    }
}
