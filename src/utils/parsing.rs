//! Payload input and output helpers for the CLI.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, WardenError};
use crate::fields::FieldValues;

/// Read a JSON document from `path`, or from stdin when `path` is `-`.
pub fn read_json(path: &Path) -> Result<Value> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            WardenError::Other(format!("Failed to read {}: {}", path.display(), e))
        })?
    };
    Ok(serde_json::from_str(&content)?)
}

/// Interpret a JSON document as a single object payload.
pub fn into_field_values(value: Value) -> Result<FieldValues> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(WardenError::validation(format!(
            "Expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Split a comma-separated list, dropping empty items.
///
/// # Examples
/// ```
/// use warden::utils::split_list;
///
/// assert_eq!(split_list("ssh, rdp,,"), vec!["ssh", "rdp"]);
/// ```
pub fn split_list(input: &str) -> Vec<&str> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Pretty-print a value as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_field_values() {
        assert!(into_field_values(json!({"a": 1})).is_ok());
        let err = into_field_values(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_read_json_file() {
        let path = std::env::temp_dir().join(format!("warden-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"username": "root"}"#).unwrap();
        let value = read_json(&path).unwrap();
        assert_eq!(value["username"], "root");
        let _ = std::fs::remove_file(path);
    }
}
