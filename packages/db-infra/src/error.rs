use thiserror::Error;

/// Exit code for success, benign no-ops and operator cancellations.
pub const EXIT_OK: i32 = 0;
/// Exit code for validation, connection, statement and migration failures.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the production guard refused the operation.
pub const EXIT_GUARD_BLOCKED: i32 = 3;
/// Exit code when the operator interrupted the run.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors raised while resolving configuration from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is required and cannot be empty")]
    Missing { field: String },

    #[error("{field} has invalid value '{value}': expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid database engine '{value}'. Must be one of: {supported}")]
    UnsupportedEngine { value: String, supported: String },

    #[error("{field} rejected: {message}")]
    WeakSecret { field: String, message: String },

    #[error("Database alias '{alias}' not found. Available aliases: {}", available.join(", "))]
    AliasNotFound {
        alias: String,
        available: Vec<String>,
    },

    #[error("Invalid database alias '{alias}': only letters, digits and '_' are allowed")]
    InvalidAlias { alias: String },

    #[error("Failed to load default database configuration: {source}")]
    DefaultDatabase { source: Box<ConfigError> },

    #[error("Failed to read project manifest {path}: {message}")]
    Manifest { path: String, message: String },
}

impl ConfigError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }
}

/// Errors raised by an engine session (connection or statement level).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection failed: {message}")]
    Connect { message: String },

    /// The engine rejected the statement as a syntax error, e.g. an older
    /// server that does not know `DROP DATABASE ... WITH (FORCE)`.
    #[error("syntax not supported by server: {message}")]
    UnsupportedSyntax { message: String },

    #[error("statement failed: {message}")]
    Statement { message: String },
}

/// Kind of object a lifecycle step operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Database,
    User,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Database => write!(f, "Database"),
            ObjectKind::User => write!(f, "User"),
        }
    }
}

/// Errors that abort the lifecycle workflow of one alias (or a whole
/// invocation, for guard blocks evaluated before fan-out).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(
        "Operation '{operation}' is not allowed in PRODUCTION. \
         Use --allow-in-production to override, or set ENV_STATE=development"
    )]
    GuardBlocked { operation: String },

    #[error("Operation cancelled by user (interrupted)")]
    Interrupted,

    #[error("{kind} '{name}' already exists. {hint}")]
    AlreadyExists {
        kind: ObjectKind,
        name: String,
        hint: String,
    },

    #[error(
        "Connection failed: {detail} (host '{host}', port {port}, user '{user}'; \
         verify the server is running and the credentials are correct)"
    )]
    ConnectionFailed {
        host: String,
        port: u16,
        user: String,
        detail: String,
    },

    #[error("Statement failed: {detail}")]
    Statement { detail: String },

    #[error("Verification failed: {detail}")]
    VerificationFailed { detail: String },

    #[error("Migrations failed (exit code {}): {stderr}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    MigrationFailed { code: Option<i32>, stderr: String },

    #[error("Prompt failed: {detail}")]
    Prompt { detail: String },
}

impl LifecycleError {
    pub fn guard_blocked(operation: impl Into<String>) -> Self {
        Self::GuardBlocked {
            operation: operation.into(),
        }
    }

    /// Guard blocks and interrupts are control-flow outcomes, not defects.
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            LifecycleError::GuardBlocked { .. } | LifecycleError::Interrupted
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            LifecycleError::GuardBlocked { .. } => EXIT_GUARD_BLOCKED,
            LifecycleError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<SessionError> for LifecycleError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Connect { message } => LifecycleError::Statement {
                detail: format!("connection lost: {message}"),
            },
            SessionError::UnsupportedSyntax { message } | SessionError::Statement { message } => {
                LifecycleError::Statement { detail: message }
            }
        }
    }
}
