//! Environment-driven configuration and guarded database lifecycle tooling.
//! Used by the `dbctl` CLI.

pub mod config;
pub mod error;
pub mod infra;
pub mod routing;

pub use config::{ConfigRegistry, DatabaseConfig, EnvState, EnvVars};
pub use error::{ConfigError, LifecycleError, ObjectKind, SessionError};
pub use infra::db::{BatchOutcome, Lifecycle, Outcome, Target};
pub use routing::{DatabaseRouter, RouteMap};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    db_test_support::logging::init();
}
