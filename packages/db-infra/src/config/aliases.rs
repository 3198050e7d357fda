//! Discovery of configured database aliases and per-alias config loading.

use tracing::warn;

use crate::config::database::{env_prefix, DatabaseConfig, DEFAULT_ALIAS};
use crate::config::env::EnvVars;
use crate::error::ConfigError;

/// Variable listing the aliases to load.
pub const ALIASES_VAR: &str = "DB_ALIASES";

/// Ordered alias identifiers, unique by environment prefix. `default` is
/// always present and first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSet {
    aliases: Vec<String>,
}

impl AliasSet {
    pub fn from_env(vars: &EnvVars) -> Result<Self, ConfigError> {
        let declared = vars.get_list(ALIASES_VAR)?.unwrap_or_default();
        Self::from_declared(declared)
    }

    pub fn from_declared<I, S>(declared: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut aliases = vec![DEFAULT_ALIAS.to_string()];
        for alias in declared {
            let alias = alias.as_ref().trim();
            if alias.is_empty() {
                continue;
            }
            if !alias
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(ConfigError::InvalidAlias {
                    alias: alias.to_string(),
                });
            }
            let prefix = env_prefix(alias);
            match aliases.iter().find(|known| env_prefix(known) == prefix) {
                Some(known) if known != alias => {
                    warn!(alias, kept = %known, "Alias differs only in case from an earlier one; ignoring it");
                }
                Some(_) => {}
                None => aliases.push(alias.to_string()),
            }
        }
        Ok(Self { aliases })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// An optional alias that was declared but failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAlias {
    pub alias: String,
    pub error: ConfigError,
}

/// Loaded database configs in declaration order.
#[derive(Debug)]
pub struct DatabaseConfigs {
    configs: Vec<DatabaseConfig>,
    skipped: Vec<SkippedAlias>,
}

impl DatabaseConfigs {
    /// Load every declared alias.
    ///
    /// A failure on `default` is fatal. Any other alias that fails is skipped
    /// with a warning and recorded in [`Self::skipped`].
    pub fn load(vars: &EnvVars, aliases: &AliasSet) -> Result<Self, ConfigError> {
        let mut configs = Vec::with_capacity(aliases.len());
        let mut skipped = Vec::new();

        for alias in aliases.iter() {
            match DatabaseConfig::from_env(vars, alias) {
                Ok(config) => configs.push(config),
                Err(e) if alias == DEFAULT_ALIAS => {
                    return Err(ConfigError::DefaultDatabase {
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(alias = %alias, error = %e, "Could not load database configuration; skipping alias");
                    skipped.push(SkippedAlias {
                        alias: alias.to_string(),
                        error: e,
                    });
                }
            }
        }

        Ok(Self { configs, skipped })
    }

    /// Config for `alias`, or `AliasNotFound` listing the loaded aliases.
    pub fn get(&self, alias: &str) -> Result<&DatabaseConfig, ConfigError> {
        self.configs
            .iter()
            .find(|c| c.alias() == alias)
            .ok_or_else(|| ConfigError::AliasNotFound {
                alias: alias.to_string(),
                available: self.aliases().map(str::to_string).collect(),
            })
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.configs.iter().any(|c| c.alias() == alias)
    }

    /// Loaded aliases in declaration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.configs.iter().map(DatabaseConfig::alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatabaseConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Declared aliases that failed to load.
    pub fn skipped(&self) -> &[SkippedAlias] {
        &self.skipped
    }
}
