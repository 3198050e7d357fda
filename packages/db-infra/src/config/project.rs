//! Project metadata read from the package manifest.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const MANIFEST_VAR: &str = "PROJECT_MANIFEST";
pub const DEFAULT_MANIFEST: &str = "Cargo.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub rust_version: Option<String>,
    pub dependencies: Vec<String>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            version: "0.0.0".to_string(),
            description: String::new(),
            rust_version: None,
            dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<PackageTable>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
struct PackageTable {
    name: Option<String>,
    version: Option<toml::Value>,
    description: Option<toml::Value>,
    #[serde(rename = "rust-version")]
    rust_version: Option<toml::Value>,
}

impl ProjectMetadata {
    /// Read `path`. A missing manifest yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(manifest_error(path, e.to_string())),
        };
        Self::parse(&text).map_err(|message| manifest_error(path, message))
    }

    fn parse(text: &str) -> Result<Self, String> {
        let manifest: Manifest = toml::from_str(text).map_err(|e| e.message().to_string())?;
        let defaults = Self::default();
        let package = manifest.package;

        Ok(Self {
            name: package
                .as_ref()
                .and_then(|p| p.name.clone())
                .unwrap_or(defaults.name),
            version: package
                .as_ref()
                .and_then(|p| p.version.as_ref().map(field_text))
                .unwrap_or(defaults.version),
            description: package
                .as_ref()
                .and_then(|p| p.description.as_ref().map(field_text))
                .unwrap_or(defaults.description),
            rust_version: package
                .as_ref()
                .and_then(|p| p.rust_version.as_ref().map(field_text)),
            dependencies: manifest.dependencies.into_keys().collect(),
        })
    }
}

/// Literal string fields pass through; `{ workspace = true }` inheritance is
/// shown as `workspace`.
fn field_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(t) if t.contains_key("workspace") => "workspace".to_string(),
        other => other.to_string(),
    }
}

fn manifest_error(path: &Path, message: String) -> ConfigError {
    ConfigError::Manifest {
        path: path.display().to_string(),
        message,
    }
}
