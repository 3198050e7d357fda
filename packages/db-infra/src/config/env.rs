//! Immutable snapshot of the variables configuration is resolved from.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;

/// Key/value snapshot of the environment.
///
/// Every schema reads from a snapshot instead of the live process env, so a
/// registry never observes changes until it is explicitly rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Build a snapshot from explicit pairs (tests, embedding).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Snapshot the process environment.
    pub fn from_process() -> Self {
        Self::from_pairs(std::env::vars())
    }

    /// Snapshot the process environment layered over a `.env` file.
    ///
    /// Process variables win over file entries. A missing file is not an
    /// error; an unreadable or malformed one is.
    pub fn from_process_with_file(env_file: &Path) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        if env_file.exists() {
            let entries = dotenvy::from_path_iter(env_file).map_err(|e| ConfigError::invalid(
                "env file",
                env_file.display().to_string(),
                format!("a readable dotenv file ({e})"),
            ))?;
            for entry in entries {
                let (key, value) = entry.map_err(|e| ConfigError::invalid(
                    "env file",
                    env_file.display().to_string(),
                    format!("valid dotenv syntax ({e})"),
                ))?;
                vars.insert(key, value);
            }
            debug!(env_file = %env_file.display(), entries = vars.len(), "loaded env file");
        }
        vars.extend(std::env::vars());
        Ok(Self { vars })
    }

    /// Raw value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value for `key` with surrounding whitespace removed; blank counts as unset.
    pub fn get_trimmed(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`).
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.get_trimmed(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::invalid(key, raw, "a boolean (true/false)")),
        }
    }

    /// Parse a list given either as a JSON array or as a comma-separated string.
    pub fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        let Some(raw) = self.get_trimmed(key) else {
            return Ok(None);
        };
        if raw.starts_with('[') {
            let items: Vec<String> = serde_json::from_str(raw)
                .map_err(|e| ConfigError::invalid(key, raw, format!("a JSON list of strings ({e})")))?;
            return Ok(Some(
                items
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ));
        }
        Ok(Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}
