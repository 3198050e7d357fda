//! Guarded database lifecycle workflows: create, drop, reset, user
//! management, setup and verification, for one alias or all of them.

use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::database::{env_prefix, AdminCredentials, DatabaseConfig, DEFAULT_ALIAS};
use crate::config::registry::ConfigRegistry;
use crate::error::{ConfigError, LifecycleError, ObjectKind, SessionError};
use crate::infra::db::batch::{BatchOutcome, Outcome};
use crate::infra::db::guard::{
    require_confirmation, require_typed_confirmation, Confirmation, ProductionGuard,
};
use crate::infra::db::migrate::MigrationRunner;
use crate::infra::db::prompt::Prompter;
use crate::infra::db::session::{release, AdminSession, ConnectParams, Connector, RolePrivileges};

const DEFAULT_ADMIN_USER: &str = "postgres";

/// Which aliases an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Alias(String),
    All,
}

impl Target {
    /// `--all` wins; otherwise the named alias, else `default`.
    pub fn from_flags(alias: Option<String>, all: bool) -> Self {
        if all {
            Target::All
        } else {
            Target::Alias(alias.unwrap_or_else(|| DEFAULT_ALIAS.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropOptions {
    pub force: bool,
    pub allow_in_production: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOptions {
    pub force: bool,
    pub no_migrate: bool,
    pub allow_in_production: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateUserOptions {
    pub superuser: bool,
    /// Drop and recreate the user if it already exists.
    pub drop: bool,
    pub force: bool,
    pub allow_in_production: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropUserOptions {
    pub force: bool,
    pub allow_in_production: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupOptions {
    pub superuser: bool,
    /// Drop database and user before recreating them.
    pub reset: bool,
    pub no_migrate: bool,
    pub force: bool,
    pub allow_in_production: bool,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Create,
    Drop(DropOptions),
    Reset(ResetOptions),
    CreateUser(CreateUserOptions),
    DropUser(DropUserOptions),
    Setup(SetupOptions),
    Verify,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Drop(_) => "drop",
            Step::Reset(_) => "reset",
            Step::CreateUser(_) => "create-user",
            Step::DropUser(_) => "drop-user",
            Step::Setup(_) => "setup",
            Step::Verify => "verify",
        }
    }
}

/// Runs lifecycle workflows against the aliases of one registry.
///
/// Fan-outs are sequential in declaration order. A failing alias never
/// stops the loop; an interrupt does, after recording the remaining aliases
/// as not attempted.
pub struct Lifecycle<'a> {
    registry: &'a ConfigRegistry,
    connector: &'a dyn Connector,
    migrator: &'a dyn MigrationRunner,
    prompter: &'a dyn Prompter,
    cancel: CancellationToken,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        registry: &'a ConfigRegistry,
        connector: &'a dyn Connector,
        migrator: &'a dyn MigrationRunner,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            registry,
            connector,
            migrator,
            prompter,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to observe operator interrupts.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn create_database(&self, target: &Target) -> Result<BatchOutcome, LifecycleError> {
        self.fan_out(Step::Create, target).await
    }

    pub async fn drop_database(
        &self,
        target: &Target,
        opts: DropOptions,
    ) -> Result<BatchOutcome, LifecycleError> {
        self.guard()?
            .require("drop database", opts.allow_in_production)?;
        self.fan_out(Step::Drop(opts), target).await
    }

    pub async fn reset_database(
        &self,
        target: &Target,
        opts: ResetOptions,
    ) -> Result<BatchOutcome, LifecycleError> {
        self.guard()?
            .require("reset database", opts.allow_in_production)?;
        self.fan_out(Step::Reset(opts), target).await
    }

    pub async fn create_user(
        &self,
        target: &Target,
        opts: CreateUserOptions,
    ) -> Result<BatchOutcome, LifecycleError> {
        if opts.superuser {
            self.guard()?
                .require("create superuser", opts.allow_in_production)?;
        }
        self.fan_out(Step::CreateUser(opts), target).await
    }

    pub async fn drop_user(
        &self,
        target: &Target,
        opts: DropUserOptions,
    ) -> Result<BatchOutcome, LifecycleError> {
        self.guard()?
            .require("drop user", opts.allow_in_production)?;
        self.fan_out(Step::DropUser(opts), target).await
    }

    pub async fn setup(
        &self,
        target: &Target,
        opts: SetupOptions,
    ) -> Result<BatchOutcome, LifecycleError> {
        let guard = self.guard()?;
        if opts.superuser {
            guard.require("create superuser", opts.allow_in_production)?;
        }
        if opts.reset {
            guard.require("reset setup", opts.allow_in_production)?;
        }
        self.fan_out(Step::Setup(opts), target).await
    }

    /// Read-only: connectivity, table count and migration plan per alias.
    pub async fn verify(&self, target: &Target) -> Result<BatchOutcome, LifecycleError> {
        self.fan_out(Step::Verify, target).await
    }

    fn guard(&self) -> Result<ProductionGuard, LifecycleError> {
        Ok(ProductionGuard::new(self.registry.env_state()?))
    }

    fn checkpoint(&self) -> Result<(), LifecycleError> {
        if self.cancel.is_cancelled() {
            Err(LifecycleError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn targets(&self, target: &Target) -> Result<Vec<&'a DatabaseConfig>, LifecycleError> {
        let databases = self.registry.databases()?;
        Ok(match target {
            Target::Alias(alias) => vec![databases.get(alias)?],
            Target::All => databases.iter().collect(),
        })
    }

    async fn fan_out(&self, step: Step, target: &Target) -> Result<BatchOutcome, LifecycleError> {
        let configs = self.targets(target)?;
        let mut batch = BatchOutcome::new(step.name());
        info!(
            operation = step.name(),
            aliases = configs.len(),
            "lifecycle=start"
        );

        for (index, config) in configs.iter().enumerate() {
            let alias = config.alias();
            if self.cancel.is_cancelled() {
                batch.skip_remaining(configs[index..].iter().map(|c| c.alias()));
                break;
            }

            info!(operation = step.name(), alias = %alias, "lifecycle=alias_start");
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(LifecycleError::Interrupted),
                result = self.run_step(step, config) => result,
            };
            log_result(step.name(), alias, &result);

            let interrupted = matches!(result, Err(LifecycleError::Interrupted));
            batch.push(alias, result);
            if interrupted {
                batch.skip_remaining(configs[index + 1..].iter().map(|c| c.alias()));
                break;
            }
        }

        info!(operation = step.name(), summary = %batch.summary(), "lifecycle=done");
        Ok(batch)
    }

    async fn run_step(
        &self,
        step: Step,
        config: &DatabaseConfig,
    ) -> Result<Outcome, LifecycleError> {
        match step {
            Step::Create => self.create_one(config).await,
            Step::Drop(opts) => self.drop_one(config, opts).await,
            Step::Reset(opts) => self.reset_one(config, opts).await,
            Step::CreateUser(opts) => self.create_user_one(config, opts).await,
            Step::DropUser(opts) => self.drop_user_one(config, opts).await,
            Step::Setup(opts) => self.setup_one(config, opts).await,
            Step::Verify => self.verify_one(config).await,
        }
    }

    async fn create_one(&self, config: &DatabaseConfig) -> Result<Outcome, LifecycleError> {
        let session = self.open(&maintenance_params(config)).await?;
        let result = create_database_verified(session.as_ref(), config).await;
        release(session).await;
        result?;
        Ok(Outcome::Completed(format!(
            "Database '{}' created",
            config.name()
        )))
    }

    async fn drop_one(
        &self,
        config: &DatabaseConfig,
        opts: DropOptions,
    ) -> Result<Outcome, LifecycleError> {
        let name = config.name();
        self.guard()?.warn_destructive("DROP DATABASE", name);
        if self.confirm_destructive(ObjectKind::Database, name, opts.force)?
            == Confirmation::Cancelled
        {
            return Ok(Outcome::Cancelled(format!("Drop of database '{name}' cancelled")));
        }
        self.checkpoint()?;

        let session = self.open(&maintenance_params(config)).await?;
        let result = drop_database_verified(session.as_ref(), name).await;
        release(session).await;

        Ok(if result? {
            Outcome::Completed(format!("Database '{name}' dropped"))
        } else {
            Outcome::NoOp(format!("Database '{name}' does not exist. Nothing to drop."))
        })
    }

    async fn reset_one(
        &self,
        config: &DatabaseConfig,
        opts: ResetOptions,
    ) -> Result<Outcome, LifecycleError> {
        let name = config.name();
        self.guard()?.warn_destructive("RESET DATABASE", name);
        if self.confirm_destructive(ObjectKind::Database, name, opts.force)?
            == Confirmation::Cancelled
        {
            return Ok(Outcome::Cancelled(format!("Reset of database '{name}' cancelled")));
        }
        self.checkpoint()?;

        let session = self.open(&maintenance_params(config)).await?;
        let result = async {
            drop_database_verified(session.as_ref(), name).await?;
            create_database_verified(session.as_ref(), config).await
        }
        .await;
        release(session).await;
        result?;

        if opts.no_migrate {
            return Ok(Outcome::Completed(format!(
                "Database '{name}' reset (migrations skipped)"
            )));
        }
        self.migrator.migrate(config.alias()).await?;
        Ok(Outcome::Completed(format!(
            "Database '{name}' reset and migrated"
        )))
    }

    async fn create_user_one(
        &self,
        config: &DatabaseConfig,
        opts: CreateUserOptions,
    ) -> Result<Outcome, LifecycleError> {
        let user = config.user();
        let guard = self.guard()?;
        if opts.superuser && guard.state().is_production() {
            warn!(
                user,
                "Creating SUPERUSER in PRODUCTION: this user will have unrestricted access to ALL databases"
            );
        }

        let admin = self.admin_credentials(config)?;
        if require_confirmation(
            self.prompter,
            &format!("Create PostgreSQL user '{user}'?"),
            true,
            opts.force,
        )? == Confirmation::Cancelled
        {
            return Ok(Outcome::Cancelled(format!("Creation of user '{user}' cancelled")));
        }
        self.checkpoint()?;

        let session = self.open(&ConnectParams::admin(config, &admin)).await?;
        let result = self
            .create_user_steps(session.as_ref(), config, opts, guard)
            .await;
        release(session).await;
        result
    }

    async fn create_user_steps(
        &self,
        session: &dyn AdminSession,
        config: &DatabaseConfig,
        opts: CreateUserOptions,
        guard: ProductionGuard,
    ) -> Result<Outcome, LifecycleError> {
        let user = config.user();
        if session.role_exists(user).await? {
            if !opts.drop {
                return Err(LifecycleError::AlreadyExists {
                    kind: ObjectKind::User,
                    name: user.to_string(),
                    hint: "Use --drop to recreate.".to_string(),
                });
            }
            guard.require("drop user", opts.allow_in_production)?;
            guard.warn_destructive("DROP USER", user);
            if require_typed_confirmation(self.prompter, ObjectKind::User, user, opts.force)?
                == Confirmation::Cancelled
            {
                return Ok(Outcome::Cancelled(format!("Recreation of user '{user}' cancelled")));
            }
            self.checkpoint()?;
            drop_role(session, user).await?;
        }

        let privileges = privileges(opts.superuser);
        session.create_role(user, config.password(), privileges).await?;
        if !session.role_exists(user).await? {
            return Err(LifecycleError::VerificationFailed {
                detail: format!("user '{user}' not present after create"),
            });
        }
        Ok(Outcome::Completed(format!(
            "User '{user}' created ({})",
            privileges.sql()
        )))
    }

    async fn drop_user_one(
        &self,
        config: &DatabaseConfig,
        opts: DropUserOptions,
    ) -> Result<Outcome, LifecycleError> {
        let user = config.user();
        self.guard()?.warn_destructive("DROP USER", user);
        if require_typed_confirmation(self.prompter, ObjectKind::User, user, opts.force)?
            == Confirmation::Cancelled
        {
            return Ok(Outcome::Cancelled(format!("Drop of user '{user}' cancelled")));
        }
        let admin = self.admin_credentials(config)?;
        self.checkpoint()?;

        let session = self.open(&ConnectParams::admin(config, &admin)).await?;
        let result = async {
            if !session.role_exists(user).await? {
                return Ok(false);
            }
            drop_role(session.as_ref(), user).await?;
            Ok::<_, LifecycleError>(true)
        }
        .await;
        release(session).await;

        Ok(if result? {
            Outcome::Completed(format!("User '{user}' dropped"))
        } else {
            Outcome::NoOp(format!("User '{user}' does not exist. Nothing to drop."))
        })
    }

    async fn setup_one(
        &self,
        config: &DatabaseConfig,
        opts: SetupOptions,
    ) -> Result<Outcome, LifecycleError> {
        let (user, name) = (config.user(), config.name());
        if !opts.force {
            if opts.reset {
                self.guard()?
                    .warn_destructive("RESET SETUP", &format!("{user} and {name}"));
            }
            if opts.superuser {
                warn!(user, "User will be created with SUPERUSER privileges");
            }
            if require_confirmation(self.prompter, "Continue?", true, false)?
                == Confirmation::Cancelled
            {
                return Ok(Outcome::Cancelled(format!(
                    "Setup of alias '{}' cancelled",
                    config.alias()
                )));
            }
        }
        let admin = self.admin_credentials(config)?;
        self.checkpoint()?;

        let session = self.open(&ConnectParams::admin(config, &admin)).await?;
        let result = setup_steps(session.as_ref(), config, opts).await;
        release(session).await;
        result?;

        if opts.no_migrate {
            return Ok(Outcome::Completed(format!(
                "Setup of '{name}' complete (migrations skipped)"
            )));
        }
        info!(alias = %config.alias(), "setup=migrate");
        self.migrator.migrate(config.alias()).await?;
        Ok(Outcome::Completed(format!("Setup of '{name}' complete")))
    }

    async fn verify_one(&self, config: &DatabaseConfig) -> Result<Outcome, LifecycleError> {
        let session = self.open(&ConnectParams::application(config)).await?;
        let result = async {
            let version = session.server_version().await?;
            let tables = session.public_table_count().await?;
            Ok::<_, LifecycleError>((version, tables))
        }
        .await;
        release(session).await;
        let (version, tables) = result?;

        if tables == 0 {
            warn!(alias = %config.alias(), "No tables in the public schema; run migrations");
        }
        let server = version.split(',').next().unwrap_or(&version).trim();
        let migrations = match self.migrator.plan(config.alias()).await {
            Ok(plan) => {
                if plan.pending > 0 {
                    warn!(
                        alias = %config.alias(),
                        pending = plan.pending,
                        "Unapplied migrations"
                    );
                }
                format!("{} applied, {} pending", plan.applied, plan.pending)
            }
            Err(e) => {
                warn!(alias = %config.alias(), error = %e, "Could not check migrations");
                format!("unknown ({e})")
            }
        };
        Ok(Outcome::Completed(format!(
            "Connected to '{}' ({server}); {tables} tables; migrations: {migrations}",
            config.name()
        )))
    }

    /// Typed confirmation followed by a final yes/no (default no).
    fn confirm_destructive(
        &self,
        kind: ObjectKind,
        name: &str,
        force: bool,
    ) -> Result<Confirmation, LifecycleError> {
        if require_typed_confirmation(self.prompter, kind, name, force)?
            == Confirmation::Cancelled
        {
            return Ok(Confirmation::Cancelled);
        }
        require_confirmation(self.prompter, "Are you absolutely sure?", false, force)
    }

    /// Configured admin credentials, or ask for them.
    fn admin_credentials(&self, config: &DatabaseConfig) -> Result<AdminCredentials, LifecycleError> {
        if let Some(admin) = config.admin_credentials() {
            return Ok(admin);
        }
        let default_user = config.admin_user().unwrap_or(DEFAULT_ADMIN_USER);
        let user = self
            .prompter
            .input("PostgreSQL admin user", Some(default_user))?;
        let user = if user.trim().is_empty() {
            default_user.to_string()
        } else {
            user.trim().to_string()
        };
        let password = self
            .prompter
            .password(&format!("Password for PostgreSQL user '{user}'"))?;
        if password.expose_secret().is_empty() {
            return Err(ConfigError::missing(format!(
                "{}ADMIN_PASSWORD",
                env_prefix(config.alias())
            ))
            .into());
        }
        Ok(AdminCredentials { user, password })
    }

    async fn open(&self, params: &ConnectParams) -> Result<Box<dyn AdminSession>, LifecycleError> {
        debug!(url = %params.redacted_url(), "session=connect");
        self.connector
            .connect(params)
            .await
            .map_err(|e| LifecycleError::ConnectionFailed {
                host: params.host.clone(),
                port: params.port,
                user: params.user.clone(),
                detail: match e {
                    SessionError::Connect { message } => message,
                    other => other.to_string(),
                },
            })
    }
}

/// Configured admin credentials when present, else the alias's own, against
/// the maintenance database.
fn maintenance_params(config: &DatabaseConfig) -> ConnectParams {
    match config.admin_credentials() {
        Some(admin) => ConnectParams::admin(config, &admin),
        None => ConnectParams::maintenance(config),
    }
}

fn privileges(superuser: bool) -> RolePrivileges {
    if superuser {
        RolePrivileges::Superuser
    } else {
        RolePrivileges::Standard
    }
}

fn log_result(operation: &str, alias: &str, result: &Result<Outcome, LifecycleError>) {
    match result {
        Ok(Outcome::Completed(message)) | Ok(Outcome::NoOp(message)) => {
            info!(operation, alias = %alias, "{message}")
        }
        Ok(Outcome::Cancelled(message)) => warn!(operation, alias = %alias, "{message}"),
        Err(e) if e.is_control_flow() => warn!(operation, alias = %alias, "{e}"),
        Err(e) => error!(operation, alias = %alias, error = %e, "lifecycle=alias_failed"),
    }
}

async fn create_database_verified(
    session: &dyn AdminSession,
    config: &DatabaseConfig,
) -> Result<(), LifecycleError> {
    let name = config.name();
    if session.database_exists(name).await? {
        return Err(LifecycleError::AlreadyExists {
            kind: ObjectKind::Database,
            name: name.to_string(),
            hint: "Use `db drop` first, or `db reset` to drop and recreate.".to_string(),
        });
    }
    session.create_database(name, config.user()).await?;
    if !session.database_exists(name).await? {
        return Err(LifecycleError::VerificationFailed {
            detail: format!("database '{name}' not present after create"),
        });
    }
    Ok(())
}

/// Drop `name` if present. Returns whether anything was dropped.
async fn drop_database_verified(
    session: &dyn AdminSession,
    name: &str,
) -> Result<bool, LifecycleError> {
    if !session.database_exists(name).await? {
        return Ok(false);
    }
    drop_database_forced(session, name).await?;
    if session.database_exists(name).await? {
        return Err(LifecycleError::VerificationFailed {
            detail: format!("database '{name}' still present after drop"),
        });
    }
    Ok(true)
}

/// `DROP ... WITH (FORCE)`, falling back to terminating sessions and a plain
/// drop on servers without that syntax.
async fn drop_database_forced(
    session: &dyn AdminSession,
    name: &str,
) -> Result<(), LifecycleError> {
    match session.drop_database(name, true).await {
        Ok(()) => Ok(()),
        Err(SessionError::UnsupportedSyntax { .. }) => {
            info!(database = name, "drop=fallback terminating sessions before plain drop");
            let terminated = session.terminate_database_sessions(name).await?;
            debug!(database = name, terminated, "drop=sessions_terminated");
            session.drop_database(name, false).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn drop_role(session: &dyn AdminSession, user: &str) -> Result<(), LifecycleError> {
    let terminated = session.terminate_role_sessions(user).await?;
    debug!(user, terminated, "drop_user=sessions_terminated");
    session.drop_role(user).await?;
    Ok(())
}

/// Drop database then user (reset only), create user and database when
/// absent, grant privileges.
async fn setup_steps(
    session: &dyn AdminSession,
    config: &DatabaseConfig,
    opts: SetupOptions,
) -> Result<(), LifecycleError> {
    let (user, name) = (config.user(), config.name());
    let mut user_exists = session.role_exists(user).await?;
    let mut db_exists = session.database_exists(name).await?;

    if opts.reset {
        if db_exists {
            drop_database_forced(session, name).await?;
            info!(database = name, "setup=database_dropped");
            db_exists = false;
        }
        if user_exists {
            drop_role(session, user).await?;
            info!(user, "setup=user_dropped");
            user_exists = false;
        }
    }

    if user_exists {
        info!(user, "setup=user_exists skipping");
    } else {
        session
            .create_role(user, config.password(), privileges(opts.superuser))
            .await?;
        info!(user, "setup=user_created");
    }

    if db_exists {
        return Err(LifecycleError::AlreadyExists {
            kind: ObjectKind::Database,
            name: name.to_string(),
            hint: "Use --reset to drop and recreate.".to_string(),
        });
    }
    session.create_database(name, user).await?;
    info!(database = name, "setup=database_created");

    session.grant_all(name, user).await?;
    info!(database = name, user, "setup=privileges_granted");
    Ok(())
}
