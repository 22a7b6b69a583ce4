//! Operator-supplied metadata attached to every telemetry event.

use crate::service::ConfigError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Static key/value context, identical for every event of the process.
pub type Metadata = Map<String, Value>;

/// Parse a `KEY=VALUE` pair. The value is kept as a JSON string.
pub fn parse_metadata_pair(pair: &str) -> Result<(String, Value), ConfigError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidMetadata {
            details: format!("expected KEY=VALUE, got '{}'", pair),
        })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidMetadata {
            details: format!("empty key in '{}'", pair),
        });
    }

    Ok((key.to_string(), Value::String(value.to_string())))
}

/// Load metadata from a JSON or YAML file (chosen by extension). The document
/// must be an object at the top level.
pub fn load_metadata_file(path: &Path) -> Result<Metadata, ConfigError> {
    let contents = fs::read_to_string(path)?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    let document: Value = if is_yaml {
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::InvalidMetadata {
            details: format!("{}: {}", path.display(), e),
        })?
    } else {
        serde_json::from_str(&contents).map_err(|e| ConfigError::InvalidMetadata {
            details: format!("{}: {}", path.display(), e),
        })?
    };

    match document {
        Value::Object(map) => Ok(map),
        other => Err(ConfigError::InvalidMetadata {
            details: format!(
                "{}: top level must be an object, got {}",
                path.display(),
                json_kind(&other)
            ),
        }),
    }
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
