//! Configuration resolution: environment state, typed settings, database
//! aliases and the registry that aggregates them.

pub mod aliases;
pub mod database;
pub mod env;
pub mod env_state;
pub mod factory;
pub mod framework;
pub mod logging;
pub mod migration;
pub mod project;
pub mod registry;

pub use aliases::{AliasSet, DatabaseConfigs, SkippedAlias};
pub use database::{AdminCredentials, DatabaseConfig, DatabaseEngine, DEFAULT_ALIAS};
pub use env::EnvVars;
pub use env_state::EnvState;
pub use factory::EnvKeyed;
pub use framework::FrameworkConfig;
pub use logging::{LogFormat, LogLevel, LogRotation, LoggingConfig};
pub use migration::MigrationSettings;
pub use project::ProjectMetadata;
pub use registry::ConfigRegistry;
