//! The external migration step.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::migration::MigrationSettings;
use crate::error::LifecycleError;

/// Applied vs pending migrations reported by the plan command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    pub applied: usize,
    pub pending: usize,
}

impl MigrationPlan {
    /// Count `[X]` (applied) and `[ ]` (pending) markers, one per line.
    pub fn parse(listing: &str) -> Self {
        listing.lines().fold(Self::default(), |mut plan, line| {
            let line = line.trim_start();
            if line.starts_with("[X]") || line.starts_with("[x]") {
                plan.applied += 1;
            } else if line.starts_with("[ ]") {
                plan.pending += 1;
            }
            plan
        })
    }

    pub fn total(&self) -> usize {
        self.applied + self.pending
    }
}

/// Runs migrations for one alias. The engine behind it is opaque.
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn migrate(&self, alias: &str) -> Result<(), LifecycleError>;

    async fn plan(&self, alias: &str) -> Result<MigrationPlan, LifecycleError>;
}

/// Runs the configured commands as blocking subprocesses with captured output.
#[derive(Debug, Clone)]
pub struct SubprocessMigrator {
    settings: MigrationSettings,
}

impl SubprocessMigrator {
    pub fn new(settings: MigrationSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, argv: Vec<String>) -> Result<String, LifecycleError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(LifecycleError::MigrationFailed {
                code: None,
                stderr: "empty migration command".to_string(),
            });
        };
        debug!(program = %program, args = ?args, "migrate=spawn");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LifecycleError::MigrationFailed {
                code: None,
                stderr: format!("failed to run '{program}': {e}"),
            })?;

        if !output.status.success() {
            return Err(LifecycleError::MigrationFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MigrationRunner for SubprocessMigrator {
    async fn migrate(&self, alias: &str) -> Result<(), LifecycleError> {
        info!(alias = %alias, "migrate=start");
        let stdout = self.run(self.settings.migrate_argv(alias)).await?;
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!(alias = %alias, "{line}");
        }
        info!(alias = %alias, "migrate=done");
        Ok(())
    }

    async fn plan(&self, alias: &str) -> Result<MigrationPlan, LifecycleError> {
        let limit = self.settings.plan_timeout;
        // The child is killed when the timed-out future is dropped
        let stdout = tokio::time::timeout(limit, self.run(self.settings.plan_argv(alias)))
            .await
            .map_err(|_| LifecycleError::MigrationFailed {
                code: None,
                stderr: format!("plan command timed out after {}s", limit.as_secs()),
            })??;
        Ok(MigrationPlan::parse(&stdout))
    }
}
