//! Runtime mode detection.

use std::fmt;
use std::str::FromStr;

use crate::config::env::EnvVars;
use crate::error::ConfigError;

/// Variable holding the runtime mode.
pub const ENV_STATE_VAR: &str = "ENV_STATE";

/// Runtime mode of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EnvState {
    #[default]
    Development,
    Production,
}

impl EnvState {
    pub const ALL: [EnvState; 2] = [EnvState::Development, EnvState::Production];

    pub fn as_str(self) -> &'static str {
        match self {
            EnvState::Development => "development",
            EnvState::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, EnvState::Production)
    }

    /// Resolve from `ENV_STATE`, defaulting to development when unset.
    pub fn resolve(vars: &EnvVars) -> Result<Self, ConfigError> {
        match vars.get_trimmed(ENV_STATE_VAR) {
            None => Ok(EnvState::Development),
            Some(raw) => raw.parse(),
        }
    }
}

impl FromStr for EnvState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(EnvState::Development),
            "production" => Ok(EnvState::Production),
            _ => Err(ConfigError::invalid(
                ENV_STATE_VAR,
                s,
                "one of: development, production",
            )),
        }
    }
}

impl fmt::Display for EnvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
