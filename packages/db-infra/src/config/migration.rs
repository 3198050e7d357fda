//! How the external migration step is invoked.

use std::time::Duration;

use crate::config::env::EnvVars;
use crate::error::ConfigError;

pub const COMMAND_VAR: &str = "MIGRATE_COMMAND";
pub const PLAN_COMMAND_VAR: &str = "MIGRATE_PLAN_COMMAND";
pub const ALIAS_FLAG_VAR: &str = "MIGRATE_ALIAS_FLAG";
pub const PLAN_TIMEOUT_VAR: &str = "MIGRATE_PLAN_TIMEOUT_SECS";

const DEFAULT_COMMAND: &str = "migration up";
const DEFAULT_PLAN_COMMAND: &str = "migration status";
const DEFAULT_ALIAS_FLAG: &str = "--database";
const DEFAULT_PLAN_TIMEOUT_SECS: u64 = 10;

/// Program and arguments of the migrate and plan commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    pub command: Vec<String>,
    pub plan_command: Vec<String>,
    pub alias_flag: String,
    /// Upper bound for one run of the plan command.
    pub plan_timeout: Duration,
}

impl MigrationSettings {
    pub fn from_env(vars: &EnvVars) -> Result<Self, ConfigError> {
        Ok(Self {
            command: split_command(vars, COMMAND_VAR, DEFAULT_COMMAND)?,
            plan_command: split_command(vars, PLAN_COMMAND_VAR, DEFAULT_PLAN_COMMAND)?,
            alias_flag: vars
                .get_trimmed(ALIAS_FLAG_VAR)
                .unwrap_or(DEFAULT_ALIAS_FLAG)
                .to_string(),
            plan_timeout: plan_timeout(vars)?,
        })
    }

    /// Full argv for migrating `alias`.
    pub fn migrate_argv(&self, alias: &str) -> Vec<String> {
        self.scoped(&self.command, alias)
    }

    /// Full argv for listing the migration plan of `alias`.
    pub fn plan_argv(&self, alias: &str) -> Vec<String> {
        self.scoped(&self.plan_command, alias)
    }

    fn scoped(&self, base: &[String], alias: &str) -> Vec<String> {
        let mut argv = base.to_vec();
        argv.push(self.alias_flag.clone());
        argv.push(alias.to_string());
        argv
    }
}

fn split_command(vars: &EnvVars, key: &str, default: &str) -> Result<Vec<String>, ConfigError> {
    let raw = vars.get_trimmed(key).unwrap_or(default);
    let argv = shell_words::split(raw)
        .map_err(|e| ConfigError::invalid(key, raw, format!("a shell command line ({e})")))?;
    if argv.is_empty() {
        return Err(ConfigError::missing(key));
    }
    Ok(argv)
}

fn plan_timeout(vars: &EnvVars) -> Result<Duration, ConfigError> {
    let Some(raw) = vars.get_trimmed(PLAN_TIMEOUT_VAR) else {
        return Ok(Duration::from_secs(DEFAULT_PLAN_TIMEOUT_SECS));
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::invalid(
            PLAN_TIMEOUT_VAR,
            raw,
            "a positive number of seconds",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_scope_commands_to_the_alias() {
        let settings = MigrationSettings::from_env(&EnvVars::default()).unwrap();
        assert_eq!(
            settings.migrate_argv("db2"),
            vec!["migration", "up", "--database", "db2"]
        );
        assert_eq!(
            settings.plan_argv("default"),
            vec!["migration", "status", "--database", "default"]
        );
        assert_eq!(settings.plan_timeout, Duration::from_secs(10));
    }

    #[test]
    fn plan_timeout_must_be_positive() {
        let vars = EnvVars::from_pairs([(PLAN_TIMEOUT_VAR, "3")]);
        let settings = MigrationSettings::from_env(&vars).unwrap();
        assert_eq!(settings.plan_timeout, Duration::from_secs(3));

        for raw in ["0", "-1", "soon"] {
            let vars = EnvVars::from_pairs([(PLAN_TIMEOUT_VAR, raw)]);
            assert!(matches!(
                MigrationSettings::from_env(&vars).unwrap_err(),
                ConfigError::InvalidValue { .. }
            ));
        }
    }

    #[test]
    fn quoted_arguments_are_kept_together() {
        let vars = EnvVars::from_pairs([
            (COMMAND_VAR, r#"python "manage py" migrate"#),
            (ALIAS_FLAG_VAR, "--db"),
        ]);
        let settings = MigrationSettings::from_env(&vars).unwrap();
        assert_eq!(
            settings.migrate_argv("a"),
            vec!["python", "manage py", "migrate", "--db", "a"]
        );
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let vars = EnvVars::from_pairs([(COMMAND_VAR, "migrate \"up")]);
        assert!(matches!(
            MigrationSettings::from_env(&vars).unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }
}
