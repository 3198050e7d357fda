pub mod batch;
pub mod guard;
pub mod lifecycle;
pub mod migrate;
pub mod prompt;
pub mod report;
pub mod session;

pub use batch::{AliasReport, BatchOutcome, Outcome};
pub use guard::{Confirmation, GuardDecision, ProductionGuard};
pub use lifecycle::{
    CreateUserOptions, DropOptions, DropUserOptions, Lifecycle, ResetOptions, SetupOptions, Target,
};
pub use migrate::{MigrationPlan, MigrationRunner, SubprocessMigrator};
pub use prompt::{NonInteractive, PromptError, Prompter};
pub use report::render_info;
pub use session::{AdminSession, ConnectParams, Connector, RolePrivileges, SeaOrmConnector};
