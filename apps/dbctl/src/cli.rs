use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use db_infra::infra::db::{
    CreateUserOptions, DropOptions, DropUserOptions, ResetOptions, SetupOptions, Target,
};

#[derive(Parser)]
#[command(name = "dbctl")]
#[command(about = "Environment-aware database lifecycle tool")]
pub struct Cli {
    /// Dotenv file layered under the process environment (process wins)
    #[arg(long, global = true, default_value = ".env")]
    pub env_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Database lifecycle commands
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Subcommand)]
pub enum DbCommand {
    /// Show environment, project and database configuration (no passwords)
    Info,

    #[command(flatten)]
    Lifecycle(LifecycleCommand),
}

/// Commands that run a workflow per alias.
#[derive(Subcommand)]
pub enum LifecycleCommand {
    /// Create the database of one alias, or of all of them
    Create {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Drop the database (asks to re-type its name unless --force)
    Drop {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        safety: SafetyArgs,
    },

    /// Drop, recreate and migrate the database
    Reset {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        safety: SafetyArgs,
        /// Skip the migration step
        #[arg(long)]
        no_migrate: bool,
    },

    /// Create the configured database user
    CreateUser {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        safety: SafetyArgs,
        /// Grant SUPERUSER, CREATEDB and CREATEROLE
        #[arg(long)]
        superuser: bool,
        /// Drop and recreate the user if it already exists
        #[arg(long)]
        drop: bool,
    },

    /// Drop the configured database user
    DropUser {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        safety: SafetyArgs,
    },

    /// Create user and database, grant privileges, then migrate
    Setup {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        safety: SafetyArgs,
        /// Create the user with SUPERUSER privileges
        #[arg(long)]
        superuser: bool,
        /// Drop the database and user first
        #[arg(long)]
        reset: bool,
        /// Skip the migration step
        #[arg(long)]
        no_migrate: bool,
    },

    /// Check connectivity, tables and pending migrations
    Verify {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args, Clone)]
pub struct TargetArgs {
    /// Alias to operate on
    #[arg(long, conflicts_with = "all")]
    pub alias: Option<String>,

    /// Operate on every configured alias
    #[arg(long)]
    pub all: bool,
}

impl TargetArgs {
    pub fn target(&self) -> Target {
        Target::from_flags(self.alias.clone(), self.all)
    }
}

#[derive(Args, Clone, Copy)]
pub struct SafetyArgs {
    /// Skip confirmation prompts
    #[arg(long)]
    pub force: bool,

    /// Allow this operation when ENV_STATE=production
    #[arg(long)]
    pub allow_in_production: bool,
}

impl SafetyArgs {
    pub fn drop(self) -> DropOptions {
        DropOptions {
            force: self.force,
            allow_in_production: self.allow_in_production,
        }
    }

    pub fn reset(self, no_migrate: bool) -> ResetOptions {
        ResetOptions {
            force: self.force,
            no_migrate,
            allow_in_production: self.allow_in_production,
        }
    }

    pub fn create_user(self, superuser: bool, drop: bool) -> CreateUserOptions {
        CreateUserOptions {
            superuser,
            drop,
            force: self.force,
            allow_in_production: self.allow_in_production,
        }
    }

    pub fn drop_user(self) -> DropUserOptions {
        DropUserOptions {
            force: self.force,
            allow_in_production: self.allow_in_production,
        }
    }

    pub fn setup(self, superuser: bool, reset: bool, no_migrate: bool) -> SetupOptions {
        SetupOptions {
            superuser,
            reset,
            no_migrate,
            force: self.force,
            allow_in_production: self.allow_in_production,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn alias_and_all_conflict() {
        let err = Cli::try_parse_from(["dbctl", "db", "create", "--alias", "db2", "--all"]);
        assert!(err.is_err());
    }

    #[test]
    fn setup_flags_map_onto_options() {
        let cli = Cli::try_parse_from([
            "dbctl",
            "db",
            "setup",
            "--all",
            "--reset",
            "--force",
            "--allow-in-production",
        ])
        .unwrap();
        let Command::Db(DbCommand::Lifecycle(LifecycleCommand::Setup {
            target,
            safety,
            superuser,
            reset,
            no_migrate,
        })) = cli.command
        else {
            panic!("expected setup");
        };
        assert_eq!(target.target(), Target::All);
        let opts = safety.setup(superuser, reset, no_migrate);
        assert!(opts.reset && opts.force && opts.allow_in_production);
        assert!(!opts.superuser && !opts.no_migrate);
    }

    #[test]
    fn info_takes_no_target() {
        let cli = Cli::try_parse_from(["dbctl", "db", "info"]).unwrap();
        assert!(matches!(cli.command, Command::Db(DbCommand::Info)));
        assert!(Cli::try_parse_from(["dbctl", "db", "info", "--all"]).is_err());
    }

    #[test]
    fn missing_alias_means_default() {
        let cli = Cli::try_parse_from(["dbctl", "db", "verify"]).unwrap();
        let Command::Db(DbCommand::Lifecycle(LifecycleCommand::Verify { target })) = cli.command
        else {
            panic!("expected verify");
        };
        assert_eq!(target.target(), Target::Alias("default".to_string()));
    }
}
