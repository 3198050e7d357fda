mod cli;
mod prompt;
mod telemetry;

use std::io::IsTerminal;

use clap::Parser;
use db_infra::config::ConfigRegistry;
use db_infra::error::{LifecycleError, EXIT_FAILURE, EXIT_OK};
use db_infra::infra::db::{
    render_info, BatchOutcome, Lifecycle, NonInteractive, Prompter, SeaOrmConnector,
    SubprocessMigrator,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::cli::{Cli, Command, DbCommand, LifecycleCommand};
use crate::prompt::TerminalPrompter;

#[tokio::main]
async fn main() {
    // Usage errors exit with clap's code 2
    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let registry = match ConfigRegistry::from_process_with_file(&cli.env_file) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return EXIT_FAILURE;
        }
    };

    let logging = registry.logging();
    let _telemetry = match telemetry::init(logging.as_ref().ok().copied()) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return EXIT_FAILURE;
        }
    };
    if let Err(e) = logging {
        error!(error = %e, "Invalid logging configuration");
        return EXIT_FAILURE;
    }

    let Command::Db(command) = cli.command;
    match command {
        DbCommand::Info => match render_info(&registry) {
            Ok(info) => {
                println!("{info}");
                EXIT_OK
            }
            Err(e) => {
                eprintln!("Configuration error: {e}");
                EXIT_FAILURE
            }
        },
        DbCommand::Lifecycle(command) => report(run_lifecycle(&registry, command).await),
    }
}

async fn run_lifecycle(
    registry: &ConfigRegistry,
    command: LifecycleCommand,
) -> Result<BatchOutcome, LifecycleError> {
    let migrator = SubprocessMigrator::new(registry.migration()?.clone());
    let connector = SeaOrmConnector::default();
    let prompter: &dyn Prompter = if std::io::stdin().is_terminal() {
        &TerminalPrompter
    } else {
        &NonInteractive
    };

    let token = CancellationToken::new();
    let interrupt = tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping after the current step");
                token.cancel();
            }
        }
    });

    let lifecycle =
        Lifecycle::new(registry, &connector, &migrator, prompter).with_cancellation(token);
    let result = match command {
        LifecycleCommand::Create { target } => lifecycle.create_database(&target.target()).await,
        LifecycleCommand::Drop { target, safety } => {
            lifecycle
                .drop_database(&target.target(), safety.drop())
                .await
        }
        LifecycleCommand::Reset {
            target,
            safety,
            no_migrate,
        } => {
            lifecycle
                .reset_database(&target.target(), safety.reset(no_migrate))
                .await
        }
        LifecycleCommand::CreateUser {
            target,
            safety,
            superuser,
            drop,
        } => {
            lifecycle
                .create_user(&target.target(), safety.create_user(superuser, drop))
                .await
        }
        LifecycleCommand::DropUser { target, safety } => {
            lifecycle
                .drop_user(&target.target(), safety.drop_user())
                .await
        }
        LifecycleCommand::Setup {
            target,
            safety,
            superuser,
            reset,
            no_migrate,
        } => {
            lifecycle
                .setup(&target.target(), safety.setup(superuser, reset, no_migrate))
                .await
        }
        LifecycleCommand::Verify { target } => lifecycle.verify(&target.target()).await,
    };

    interrupt.abort();
    result
}

/// Print the batch (or the invocation-level error) and pick the exit code.
fn report(result: Result<BatchOutcome, LifecycleError>) -> i32 {
    match result {
        Ok(batch) => {
            println!("{batch}");
            batch.exit_code()
        }
        Err(e) => {
            if e.is_control_flow() {
                warn!("{e}");
            } else {
                error!(error = %e, "Command failed");
            }
            eprintln!("{e}");
            e.exit_code()
        }
    }
}
