//! The configuration registry: one explicitly constructed aggregate passed to
//! every component that needs configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::aliases::{AliasSet, DatabaseConfigs};
use crate::config::database::DatabaseConfig;
use crate::config::env::EnvVars;
use crate::config::env_state::EnvState;
use crate::config::factory::EnvKeyed;
use crate::config::framework::FrameworkConfig;
use crate::config::logging::LoggingConfig;
use crate::config::migration::MigrationSettings;
use crate::config::project::{ProjectMetadata, DEFAULT_MANIFEST, MANIFEST_VAR};
use crate::error::ConfigError;
use crate::routing::{DatabaseRouter, RouteMap};

#[derive(Debug, Clone)]
enum Source {
    /// Process environment, optionally layered over a `.env` file.
    Process { env_file: Option<PathBuf> },
    /// Caller-provided snapshot.
    Fixed,
}

/// Lazily resolved configuration aggregate.
///
/// Every field is computed on first access and memoized independently: a
/// failing field stays failing (and is retried on the next access) without
/// blocking the others. Once populated, the registry is read-only and safe to
/// share between threads. The only way to observe environment changes is
/// [`ConfigRegistry::reload`], which builds a fresh registry.
pub struct ConfigRegistry {
    source: Source,
    vars: Arc<EnvVars>,
    env_state: OnceCell<EnvState>,
    framework: EnvKeyed<FrameworkConfig>,
    logging: EnvKeyed<LoggingConfig>,
    databases: OnceCell<DatabaseConfigs>,
    project: OnceCell<ProjectMetadata>,
    migration: OnceCell<MigrationSettings>,
    router: OnceCell<DatabaseRouter>,
}

impl ConfigRegistry {
    /// Registry over the current process environment.
    pub fn from_process() -> Self {
        Self::build(Source::Process { env_file: None }, EnvVars::from_process())
    }

    /// Registry over the process environment layered over `env_file`.
    pub fn from_process_with_file(env_file: &Path) -> Result<Self, ConfigError> {
        let vars = EnvVars::from_process_with_file(env_file)?;
        Ok(Self::build(
            Source::Process {
                env_file: Some(env_file.to_path_buf()),
            },
            vars,
        ))
    }

    /// Registry over a fixed snapshot. Used by tests and embedders.
    pub fn from_vars(vars: EnvVars) -> Self {
        Self::build(Source::Fixed, vars)
    }

    fn build(source: Source, vars: EnvVars) -> Self {
        let vars = Arc::new(vars);

        let framework = {
            let (dev, prod) = (vars.clone(), vars.clone());
            EnvKeyed::new()
                .with(EnvState::Development, move || FrameworkConfig::development(&dev))
                .with(EnvState::Production, move || FrameworkConfig::production(&prod))
        };
        let logging = {
            let (dev, prod) = (vars.clone(), vars.clone());
            EnvKeyed::new()
                .with(EnvState::Development, move || LoggingConfig::development(&dev))
                .with(EnvState::Production, move || LoggingConfig::production(&prod))
        };

        Self {
            source,
            vars,
            env_state: OnceCell::new(),
            framework,
            logging,
            databases: OnceCell::new(),
            project: OnceCell::new(),
            migration: OnceCell::new(),
            router: OnceCell::new(),
        }
    }

    /// Discard every memoized field and re-resolve from scratch.
    ///
    /// Process-backed registries take a new snapshot of the environment
    /// (and re-read the env file); fixed registries re-derive from the same
    /// snapshot.
    pub fn reload(&self) -> Result<Self, ConfigError> {
        debug!("reloading configuration registry");
        match &self.source {
            Source::Process { env_file: None } => Ok(Self::from_process()),
            Source::Process {
                env_file: Some(path),
            } => Self::from_process_with_file(path),
            Source::Fixed => Ok(Self::from_vars(EnvVars::clone(&self.vars))),
        }
    }

    /// The snapshot this registry resolves from.
    pub fn vars(&self) -> &EnvVars {
        &self.vars
    }

    pub fn env_state(&self) -> Result<EnvState, ConfigError> {
        self.env_state
            .get_or_try_init(|| EnvState::resolve(&self.vars))
            .copied()
    }

    pub fn is_production(&self) -> Result<bool, ConfigError> {
        Ok(self.env_state()?.is_production())
    }

    /// Framework settings for the resolved environment state.
    pub fn framework(&self) -> Result<&FrameworkConfig, ConfigError> {
        let state = self.env_state()?;
        self.framework.get(state)
    }

    /// Logging settings for the resolved environment state.
    pub fn logging(&self) -> Result<&LoggingConfig, ConfigError> {
        let state = self.env_state()?;
        self.logging.get(state)
    }

    /// Every loaded database alias. Fails only if `default` cannot be loaded.
    pub fn databases(&self) -> Result<&DatabaseConfigs, ConfigError> {
        self.databases.get_or_try_init(|| {
            let aliases = AliasSet::from_env(&self.vars)?;
            DatabaseConfigs::load(&self.vars, &aliases)
        })
    }

    /// Config for one alias.
    pub fn database(&self, alias: &str) -> Result<&DatabaseConfig, ConfigError> {
        self.databases()?.get(alias)
    }

    pub fn project(&self) -> Result<&ProjectMetadata, ConfigError> {
        self.project
            .get_or_try_init(|| ProjectMetadata::load(&self.manifest_path()))
    }

    pub fn migration(&self) -> Result<&MigrationSettings, ConfigError> {
        self.migration
            .get_or_try_init(|| MigrationSettings::from_env(&self.vars))
    }

    /// Router over the routes declared in `DB_ROUTES`.
    pub fn router(&self) -> Result<&DatabaseRouter, ConfigError> {
        self.router
            .get_or_try_init(|| RouteMap::from_env(&self.vars).map(DatabaseRouter::new))
    }

    pub fn manifest_path(&self) -> PathBuf {
        PathBuf::from(self.vars.get_trimmed(MANIFEST_VAR).unwrap_or(DEFAULT_MANIFEST))
    }
}

impl std::fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("source", &self.source)
            .field("env_state", &self.env_state.get())
            .field("databases_loaded", &self.databases.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use db_test_support::fixtures::{database_vars, strong_secret_key};

    use super::*;

    fn registry(extra: &[(&str, &str)]) -> ConfigRegistry {
        let mut pairs = database_vars("default");
        pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        ConfigRegistry::from_vars(EnvVars::from_pairs(pairs))
    }

    #[test]
    fn fields_are_memoized() {
        let registry = registry(&[]);
        let a = registry.databases().unwrap();
        let b = registry.databases().unwrap();
        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(
            registry.logging().unwrap(),
            registry.logging().unwrap()
        ));
    }

    #[test]
    fn failing_field_does_not_block_the_others() {
        let registry = registry(&[("ENV_STATE", "production"), ("APP_SECRET_KEY", "short")]);

        assert!(matches!(
            registry.framework().unwrap_err(),
            ConfigError::WeakSecret { .. }
        ));
        assert_eq!(registry.env_state().unwrap(), EnvState::Production);
        assert_eq!(registry.database("default").unwrap().name(), "app");
        assert!(registry.logging().unwrap().write_to_file);
    }

    #[test]
    fn production_framework_is_built_only_in_production() {
        // A weak key is irrelevant in development: the production variant
        // never gets constructed.
        let registry = registry(&[("APP_SECRET_KEY", "short")]);
        assert_eq!(registry.framework().unwrap().state(), EnvState::Development);

        let key = strong_secret_key();
        let registry = registry_with_key(&key);
        assert_eq!(registry.framework().unwrap().state(), EnvState::Production);
    }

    fn registry_with_key(key: &str) -> ConfigRegistry {
        registry(&[("ENV_STATE", "production"), ("APP_SECRET_KEY", key)])
    }

    #[test]
    fn invalid_env_state_is_fatal_for_dependent_fields() {
        let registry = registry(&[("ENV_STATE", "staging")]);
        assert!(registry.env_state().is_err());
        assert!(registry.framework().is_err());
        assert!(registry.databases().is_ok());
    }

    #[test]
    fn reload_yields_an_independent_registry() {
        let registry = registry(&[]);
        let before = registry.databases().unwrap() as *const DatabaseConfigs;

        let reloaded = registry.reload().unwrap();
        assert!(reloaded.databases.get().is_none());
        let after = reloaded.databases().unwrap() as *const DatabaseConfigs;
        assert_ne!(before, after);
        assert_eq!(reloaded.database("default").unwrap().name(), "app");
    }
}
