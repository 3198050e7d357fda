//! Read-only rendering for `db info`.

use std::fmt;

use crate::config::aliases::DatabaseConfigs;
use crate::config::env_state::EnvState;
use crate::config::framework::FrameworkConfig;
use crate::config::project::ProjectMetadata;
use crate::config::registry::ConfigRegistry;
use crate::error::ConfigError;
use crate::routing::DatabaseRouter;

/// Environment, project and every loaded alias. Never includes passwords.
pub fn render_info(registry: &ConfigRegistry) -> Result<String, ConfigError> {
    let info = InfoReport {
        state: registry.env_state()?,
        project: registry.project()?,
        databases: registry.databases()?,
        router: registry.router()?,
        framework: registry.framework(),
    };
    Ok(info.to_string())
}

struct InfoReport<'a> {
    state: EnvState,
    project: &'a ProjectMetadata,
    databases: &'a DatabaseConfigs,
    router: &'a DatabaseRouter,
    framework: Result<&'a FrameworkConfig, ConfigError>,
}

impl fmt::Display for InfoReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Environment: {}", self.state.as_str().to_uppercase())?;
        writeln!(f, "Project: {} {}", self.project.name, self.project.version)?;
        if !self.project.description.is_empty() {
            writeln!(f, "  {}", self.project.description)?;
        }
        match &self.framework {
            Ok(framework) => writeln!(
                f,
                "Framework: debug {}, allowed hosts: {}",
                if framework.debug() { "on" } else { "off" },
                framework.allowed_hosts().join(", ")
            )?,
            Err(e) => writeln!(f, "Framework: invalid ({e})")?,
        }

        write!(f, "\nDatabases ({}):", self.databases.len())?;
        for config in self.databases.iter() {
            write!(f, "\n  [{}]", config.alias())?;
            write!(f, "\n    engine: {}", config.engine())?;
            write!(f, "\n    name:   {}", config.name())?;
            write!(f, "\n    user:   {}", config.user())?;
            write!(f, "\n    host:   {}", config.host())?;
            write!(f, "\n    port:   {}", config.port())?;
        }

        let mut routes = self.router.route_map().routes().peekable();
        if routes.peek().is_some() {
            write!(f, "\n\nRoutes:")?;
            for (label, alias) in routes {
                write!(f, "\n  {label} -> {alias}")?;
            }
            for warning in self.router.validate_against(self.databases) {
                write!(f, "\n  warning: {warning}")?;
            }
        }

        if !self.databases.skipped().is_empty() {
            write!(f, "\n\nSkipped aliases:")?;
            for skipped in self.databases.skipped() {
                write!(f, "\n  [{}] {}", skipped.alias, skipped.error)?;
            }
        }
        Ok(())
    }
}
