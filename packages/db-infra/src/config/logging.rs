//! Logging settings, one preset per environment state with `LOG_*` overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::env::EnvVars;
use crate::config::env_state::EnvState;
use crate::error::ConfigError;

pub const LEVEL_VAR: &str = "LOG_LEVEL";
pub const DIR_VAR: &str = "LOG_DIR";
pub const FORMAT_VAR: &str = "LOG_FORMAT";
pub const ROTATION_VAR: &str = "LOG_ROTATION";
pub const RETENTION_VAR: &str = "LOG_RETENTION";
pub const WRITE_TO_FILE_VAR: &str = "LOG_WRITE_TO_FILE";

/// Name of the log file written under [`LoggingConfig::log_dir`].
pub const LOG_FILE_NAME: &str = "app.log";

const DEFAULT_LOG_DIR: &str = "logs";
const MAX_RETENTION: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    ///
    /// `tracing` has no level above `error`, so `CRITICAL` maps onto it.
    pub fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::invalid(
                LEVEL_VAR,
                s,
                "one of DEBUG, INFO, WARNING, ERROR, CRITICAL",
            )),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::invalid(FORMAT_VAR, s, "one of pretty, json")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl FromStr for LogRotation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" => Ok(LogRotation::Minutely),
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            _ => Err(ConfigError::invalid(
                ROTATION_VAR,
                s,
                "one of minutely, hourly, daily, never",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub log_dir: PathBuf,
    pub format: LogFormat,
    pub rotation: LogRotation,
    /// Number of rotated files kept.
    pub retention: usize,
    pub write_to_file: bool,
}

impl LoggingConfig {
    /// Development preset: verbose, console only.
    pub fn development(vars: &EnvVars) -> Result<Self, ConfigError> {
        Self {
            level: LogLevel::Debug,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            format: LogFormat::Pretty,
            rotation: LogRotation::Daily,
            retention: 7,
            write_to_file: false,
        }
        .with_overrides(vars)
    }

    /// Production preset: `INFO`, JSON file output, a month of history.
    pub fn production(vars: &EnvVars) -> Result<Self, ConfigError> {
        Self {
            level: LogLevel::Info,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            format: LogFormat::Json,
            rotation: LogRotation::Daily,
            retention: 30,
            write_to_file: true,
        }
        .with_overrides(vars)
    }

    pub fn for_state(state: EnvState, vars: &EnvVars) -> Result<Self, ConfigError> {
        match state {
            EnvState::Development => Self::development(vars),
            EnvState::Production => Self::production(vars),
        }
    }

    fn with_overrides(mut self, vars: &EnvVars) -> Result<Self, ConfigError> {
        if let Some(raw) = vars.get_trimmed(LEVEL_VAR) {
            self.level = raw.parse()?;
        }
        if let Some(raw) = vars.get_trimmed(DIR_VAR) {
            self.log_dir = PathBuf::from(raw);
        }
        if let Some(raw) = vars.get_trimmed(FORMAT_VAR) {
            self.format = raw.parse()?;
        }
        if let Some(raw) = vars.get_trimmed(ROTATION_VAR) {
            self.rotation = raw.parse()?;
        }
        if let Some(raw) = vars.get_trimmed(RETENTION_VAR) {
            let value: i64 = raw
                .parse()
                .map_err(|_| ConfigError::invalid(RETENTION_VAR, raw, "a whole number of files"))?;
            if !(1..=MAX_RETENTION).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field: RETENTION_VAR.to_string(),
                    value,
                    min: 1,
                    max: MAX_RETENTION,
                });
            }
            self.retention = value as usize;
        }
        if let Some(flag) = vars.get_bool(WRITE_TO_FILE_VAR)? {
            self.write_to_file = flag;
        }
        Ok(self)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_by_environment() {
        let vars = EnvVars::default();
        let dev = LoggingConfig::for_state(EnvState::Development, &vars).unwrap();
        let prod = LoggingConfig::for_state(EnvState::Production, &vars).unwrap();

        assert_eq!(dev.level, LogLevel::Debug);
        assert!(!dev.write_to_file);
        assert_eq!(dev.retention, 7);

        assert_eq!(prod.level, LogLevel::Info);
        assert!(prod.write_to_file);
        assert_eq!(prod.retention, 30);
        assert_eq!(prod.log_file_path(), PathBuf::from("logs").join("app.log"));
    }

    #[test]
    fn overrides_are_applied_on_top_of_the_preset() {
        let vars = EnvVars::from_pairs([
            (LEVEL_VAR, "warning"),
            (DIR_VAR, "/var/log/app"),
            (RETENTION_VAR, "14"),
            (WRITE_TO_FILE_VAR, "false"),
        ]);
        let config = LoggingConfig::production(&vars).unwrap();
        assert_eq!(config.level, LogLevel::Warning);
        assert_eq!(config.level.filter_directive(), "warn");
        assert_eq!(config.log_dir(), Path::new("/var/log/app"));
        assert_eq!(config.retention, 14);
        assert!(!config.write_to_file);
    }

    #[test]
    fn retention_is_range_checked() {
        let vars = EnvVars::from_pairs([(RETENTION_VAR, "0")]);
        assert!(matches!(
            LoggingConfig::development(&vars).unwrap_err(),
            ConfigError::OutOfRange { .. }
        ));
    }

    #[test]
    fn unknown_level_names_the_variable() {
        let vars = EnvVars::from_pairs([(LEVEL_VAR, "loud")]);
        let err = LoggingConfig::development(&vars).unwrap_err();
        assert!(err.to_string().starts_with("LOG_LEVEL"), "{err}");
    }
}
