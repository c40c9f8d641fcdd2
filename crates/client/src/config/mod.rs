//! Configuration resolution
//!
//! Turns an inline key/value map or a config file into validated
//! [`ConnectionSettings`]. File format is detected by extension and parsed
//! as TOML or JSON. Unknown keys are ignored.
//!
//! `verify_ssl` accepts loose boolean forms: `false`, `"false"`, `"f"`,
//! `"no"`, `"n"` and `"0"` (case-insensitive) read as false, anything else
//! as true.

use std::path::{Path, PathBuf};

use nolijweb_domain::{ConnectionSettings, NolijError, Result};
use serde_json::Value;

/// Configuration keys recognized by the resolver. Anything else is ignored.
pub const VALID_CONFIG_KEYS: &[&str] = &["base_url", "username", "password", "verify_ssl"];

/// Where connection settings come from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Inline key/value map.
    Map(serde_json::Map<String, Value>),
    /// Path to a TOML or JSON file.
    File(PathBuf),
}

impl ConfigSource {
    /// Build a source from a loosely typed value: an object becomes an
    /// inline map, a string a file path. Anything else is rejected.
    ///
    /// # Errors
    /// Returns `NolijError::Config` for null and non-map/non-string values.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::Map(map)),
            Value::String(path) => Ok(Self::File(PathBuf::from(path))),
            _ => Err(NolijError::Config("invalid configuration options supplied".to_string())),
        }
    }

    /// Resolve this source into connection settings.
    ///
    /// # Errors
    /// Returns `NolijError::Config` if a config file is missing or contains
    /// invalid syntax.
    pub fn resolve(&self) -> Result<ConnectionSettings> {
        match self {
            Self::Map(map) => Ok(settings_from_map(map)),
            Self::File(path) => load_from_file(path),
        }
    }
}

impl From<serde_json::Map<String, Value>> for ConfigSource {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl From<PathBuf> for ConfigSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for ConfigSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

/// Build settings from a key/value map, dropping unrecognized keys.
///
/// Missing credentials and base URL default to empty strings; the server
/// rejects them at login, resolution itself does not.
fn settings_from_map(map: &serde_json::Map<String, Value>) -> ConnectionSettings {
    let cleaned: serde_json::Map<String, Value> = map
        .iter()
        .filter(|(key, _)| VALID_CONFIG_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    ConnectionSettings {
        base_url: cleaned.get("base_url").map(value_to_string).unwrap_or_default(),
        username: cleaned.get("username").map(value_to_string).unwrap_or_default(),
        password: cleaned.get("password").map(value_to_string).unwrap_or_default(),
        verify_ssl: cleaned.get("verify_ssl").map(truthy).unwrap_or(true),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse the loose boolean forms accepted for `verify_ssl`.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(s) => {
            !matches!(s.to_ascii_lowercase().as_str(), "false" | "f" | "no" | "n" | "0")
        }
        _ => true,
    }
}

/// Load settings from a TOML or JSON file.
fn load_from_file(path: &Path) -> Result<ConnectionSettings> {
    if !path.exists() {
        return Err(NolijError::Config(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), "loading connection settings from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| NolijError::Config(format!("failed to read configuration file: {e}")))?;

    match parse_config(&contents, path)? {
        Value::Object(map) => Ok(settings_from_map(&map)),
        _ => Err(NolijError::Config("invalid configuration options supplied".to_string())),
    }
}

/// Parse file contents, dispatching on the file extension. Files without a
/// recognized extension are treated as TOML.
fn parse_config(contents: &str, path: &Path) -> Result<Value> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "json" => serde_json::from_str(contents).map_err(|e| {
            NolijError::Config(format!("configuration file contains invalid syntax: {e}"))
        }),
        _ => toml::from_str(contents).map_err(|e| {
            NolijError::Config(format!("configuration file contains invalid syntax: {e}"))
        }),
    }
}
