//! Short-lived administrative sessions against the database server.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    RuntimeErr, Statement,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::config::database::{encode, url_host, AdminCredentials, DatabaseConfig};
use crate::error::SessionError;

/// SQLSTATE raised by Postgres for syntax errors.
const SQLSTATE_SYNTAX_ERROR: &str = "42601";

/// Where and as whom a short-lived session connects.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub dbname: String,
}

impl ConnectParams {
    /// The alias's own credentials against the engine's maintenance database.
    pub fn maintenance(config: &DatabaseConfig) -> Self {
        Self {
            host: config.host().to_string(),
            port: config.port(),
            user: config.user().to_string(),
            password: config.password().clone(),
            dbname: config.engine().maintenance_database().to_string(),
        }
    }

    /// Admin credentials against the engine's maintenance database.
    pub fn admin(config: &DatabaseConfig, admin: &AdminCredentials) -> Self {
        Self {
            host: config.host().to_string(),
            port: config.port(),
            user: admin.user.clone(),
            password: admin.password.clone(),
            dbname: config.engine().maintenance_database().to_string(),
        }
    }

    /// The alias's own credentials against its application database.
    pub fn application(config: &DatabaseConfig) -> Self {
        Self {
            dbname: config.name().to_string(),
            ..Self::maintenance(config)
        }
    }

    fn url(&self) -> String {
        self.render(&encode(self.password.expose_secret()))
    }

    /// Connection string with the password masked.
    pub fn redacted_url(&self) -> String {
        self.render("***")
    }

    fn render(&self, password: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            encode(&self.user),
            password,
            url_host(&self.host),
            self.port,
            encode(&self.dbname)
        )
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .finish()
    }
}

/// Attributes granted to a role at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePrivileges {
    /// `CREATEDB LOGIN`
    Standard,
    /// `SUPERUSER CREATEDB CREATEROLE LOGIN`
    Superuser,
}

impl RolePrivileges {
    pub fn sql(self) -> &'static str {
        match self {
            RolePrivileges::Standard => "CREATEDB LOGIN",
            RolePrivileges::Superuser => "SUPERUSER CREATEDB CREATEROLE LOGIN",
        }
    }
}

/// One open administrative session against a database server.
///
/// Each method is a single atomic statement. Sessions are opened right
/// before use and must be handed back through [`AdminSession::close`].
#[async_trait]
pub trait AdminSession: Send + Sync {
    async fn database_exists(&self, name: &str) -> Result<bool, SessionError>;

    async fn role_exists(&self, name: &str) -> Result<bool, SessionError>;

    async fn create_database(&self, name: &str, owner: &str) -> Result<(), SessionError>;

    /// Drop `name`. With `force`, the server terminates remaining sessions
    /// itself; servers that lack that syntax fail with
    /// [`SessionError::UnsupportedSyntax`].
    async fn drop_database(&self, name: &str, force: bool) -> Result<(), SessionError>;

    /// Terminate every other backend connected to `name`. Returns the count.
    async fn terminate_database_sessions(&self, name: &str) -> Result<u64, SessionError>;

    /// Terminate every other backend logged in as `role`. Returns the count.
    async fn terminate_role_sessions(&self, role: &str) -> Result<u64, SessionError>;

    async fn create_role(
        &self,
        name: &str,
        password: &SecretString,
        privileges: RolePrivileges,
    ) -> Result<(), SessionError>;

    async fn drop_role(&self, name: &str) -> Result<(), SessionError>;

    async fn grant_all(&self, database: &str, role: &str) -> Result<(), SessionError>;

    async fn server_version(&self) -> Result<String, SessionError>;

    async fn public_table_count(&self) -> Result<i64, SessionError>;

    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Opens [`AdminSession`]s.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AdminSession>, SessionError>;
}

/// Close `session`, logging instead of failing: the statement outcome has
/// already been decided by the time a session is released.
pub async fn release(session: Box<dyn AdminSession>) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close database session");
    }
}

/// Postgres sessions over a single-connection sea-orm pool.
#[derive(Debug, Clone)]
pub struct SeaOrmConnector {
    acquire_timeout: Duration,
}

impl Default for SeaOrmConnector {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl SeaOrmConnector {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self { acquire_timeout }
    }
}

#[async_trait]
impl Connector for SeaOrmConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AdminSession>, SessionError> {
        let mut opt = ConnectOptions::new(params.url());
        opt.min_connections(1)
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .sqlx_logging(false);

        let conn = Database::connect(opt).await.map_err(map_db_err)?;
        debug!(url = %params.redacted_url(), "session=open");
        Ok(Box::new(SeaOrmSession { conn }))
    }
}

struct SeaOrmSession {
    conn: DatabaseConnection,
}

impl SeaOrmSession {
    async fn execute(&self, sql: String) -> Result<(), SessionError> {
        self.conn
            .execute_unprepared(&sql)
            .await
            .map(|_| ())
            .map_err(map_db_err)
    }

    async fn exists(&self, sql: &str, value: &str) -> Result<bool, SessionError> {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            sql,
            vec![value.into()],
        );
        let row = self.conn.query_one(stmt).await.map_err(map_db_err)?;
        Ok(row.is_some())
    }

    async fn count(&self, sql: &str, values: Vec<sea_orm::Value>) -> Result<i64, SessionError> {
        let stmt = Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, values);
        let row = self
            .conn
            .query_one(stmt)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| SessionError::Statement {
                message: "count query returned no row".to_string(),
            })?;
        row.try_get("", "n").map_err(|e| SessionError::Statement {
            message: format!("failed to read count: {e}"),
        })
    }
}

#[async_trait]
impl AdminSession for SeaOrmSession {
    async fn database_exists(&self, name: &str) -> Result<bool, SessionError> {
        self.exists("SELECT 1 FROM pg_database WHERE datname = $1", name)
            .await
    }

    async fn role_exists(&self, name: &str) -> Result<bool, SessionError> {
        self.exists("SELECT 1 FROM pg_roles WHERE rolname = $1", name)
            .await
    }

    async fn create_database(&self, name: &str, owner: &str) -> Result<(), SessionError> {
        self.execute(format!(
            "CREATE DATABASE {} OWNER {}",
            quote_ident(name),
            quote_ident(owner)
        ))
        .await
    }

    async fn drop_database(&self, name: &str, force: bool) -> Result<(), SessionError> {
        let sql = if force {
            format!("DROP DATABASE {} WITH (FORCE)", quote_ident(name))
        } else {
            format!("DROP DATABASE {}", quote_ident(name))
        };
        self.execute(sql).await
    }

    async fn terminate_database_sessions(&self, name: &str) -> Result<u64, SessionError> {
        let n = self
            .count(
                "SELECT count(pg_terminate_backend(pid)) AS n FROM pg_stat_activity \
                 WHERE datname = $1 AND pid <> pg_backend_pid()",
                vec![name.into()],
            )
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn terminate_role_sessions(&self, role: &str) -> Result<u64, SessionError> {
        let n = self
            .count(
                "SELECT count(pg_terminate_backend(pid)) AS n FROM pg_stat_activity \
                 WHERE usename = $1 AND pid <> pg_backend_pid()",
                vec![role.into()],
            )
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn create_role(
        &self,
        name: &str,
        password: &SecretString,
        privileges: RolePrivileges,
    ) -> Result<(), SessionError> {
        // Utility statements take no bind parameters; the literal is escaped.
        self.execute(format!(
            "CREATE USER {} WITH PASSWORD {} {}",
            quote_ident(name),
            quote_literal(password.expose_secret()),
            privileges.sql()
        ))
        .await
    }

    async fn drop_role(&self, name: &str) -> Result<(), SessionError> {
        self.execute(format!("DROP USER {}", quote_ident(name)))
            .await
    }

    async fn grant_all(&self, database: &str, role: &str) -> Result<(), SessionError> {
        self.execute(format!(
            "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
            quote_ident(database),
            quote_ident(role)
        ))
        .await
    }

    async fn server_version(&self) -> Result<String, SessionError> {
        let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT version() AS version");
        let row = self
            .conn
            .query_one(stmt)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| SessionError::Statement {
                message: "version() returned no row".to_string(),
            })?;
        row.try_get("", "version")
            .map_err(|e| SessionError::Statement {
                message: format!("failed to read server version: {e}"),
            })
    }

    async fn public_table_count(&self) -> Result<i64, SessionError> {
        self.count(
            "SELECT count(*) AS n FROM information_schema.tables WHERE table_schema = 'public'",
            Vec::new(),
        )
        .await
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        let SeaOrmSession { conn } = *self;
        conn.close().await.map_err(map_db_err)?;
        debug!("session=closed");
        Ok(())
    }
}

/// SQLSTATE reported by the server, independent of `lc_messages`.
fn sqlstate(e: &DbErr) -> Option<String> {
    match e {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

fn map_db_err(e: DbErr) -> SessionError {
    if matches!(e, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
        return SessionError::Connect {
            message: e.to_string(),
        };
    }
    let syntax = sqlstate(&e).as_deref() == Some(SQLSTATE_SYNTAX_ERROR);
    let message = e.to_string();
    if syntax {
        SessionError::UnsupportedSyntax { message }
    } else {
        SessionError::Statement { message }
    }
}

/// Quote an identifier: wrap in `"` and double any embedded `"`.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal: wrap in `'` and double any embedded `'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use sea_orm::sqlx::error::{DatabaseError, ErrorKind};

    use super::*;
    use crate::config::env::EnvVars;

    fn config() -> DatabaseConfig {
        let vars = EnvVars::from_pairs([
            ("DB_NAME", "app"),
            ("DB_USER", "owner"),
            ("DB_PASSWORD", "p@ss:word"),
            ("DB_HOST", "::1"),
        ]);
        DatabaseConfig::from_env(&vars, "default").unwrap()
    }

    #[test]
    fn identifiers_and_literals_are_escaped() {
        assert_eq!(quote_ident("app"), "\"app\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn maintenance_params_target_the_postgres_database() {
        let params = ConnectParams::maintenance(&config());
        assert_eq!(params.dbname, "postgres");
        assert_eq!(params.user, "owner");
        assert_eq!(
            params.redacted_url(),
            "postgres://owner:***@[::1]:5432/postgres"
        );
        assert_eq!(params.url(), "postgres://owner:p%40ss%3Aword@[::1]:5432/postgres");
        assert!(!format!("{params:?}").contains("p@ss"));
    }

    #[test]
    fn application_params_target_the_alias_database() {
        assert_eq!(ConnectParams::application(&config()).dbname, "app");
    }

    /// Server error carrying a SQLSTATE and a localized message.
    #[derive(Debug)]
    struct ServerError {
        code: &'static str,
        message: &'static str,
    }

    impl fmt::Display for ServerError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for ServerError {}

    impl DatabaseError for ServerError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn exec_err(code: &'static str, message: &'static str) -> DbErr {
        DbErr::Exec(RuntimeErr::SqlxError(sea_orm::sqlx::Error::Database(Box::new(
            ServerError { code, message },
        ))))
    }

    #[test]
    fn syntax_errors_are_recognized_by_sqlstate() {
        let err = map_db_err(exec_err("42601", "Syntaxfehler bei »WITH«"));
        assert!(matches!(err, SessionError::UnsupportedSyntax { .. }));

        let err = map_db_err(exec_err("42501", "permission denied for database app"));
        assert!(matches!(err, SessionError::Statement { .. }));
    }

    #[test]
    fn message_text_alone_is_not_a_syntax_error() {
        let err = map_db_err(DbErr::Custom("syntax error at or near \"WITH\"".to_string()));
        assert!(matches!(err, SessionError::Statement { .. }));
    }
}
