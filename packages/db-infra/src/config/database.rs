//! Per-alias database connection settings.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::OnceCell;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::{ExposeSecret, SecretString};

use crate::config::env::EnvVars;
use crate::error::ConfigError;

/// Alias that is always loaded and whose failure aborts startup.
pub const DEFAULT_ALIAS: &str = "default";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// Characters left unescaped in URL userinfo and path segments.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseEngine {
    #[default]
    Postgresql,
}

impl DatabaseEngine {
    pub const SUPPORTED: [DatabaseEngine; 1] = [DatabaseEngine::Postgresql];

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseEngine::Postgresql => "postgresql",
        }
    }

    /// Canonical URL scheme for connection strings.
    pub fn url_scheme(self) -> &'static str {
        match self {
            DatabaseEngine::Postgresql => "postgresql",
        }
    }

    /// Database every server has, used for create/drop of other databases.
    pub fn maintenance_database(self) -> &'static str {
        match self {
            DatabaseEngine::Postgresql => "postgres",
        }
    }
}

impl FromStr for DatabaseEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUPPORTED
            .into_iter()
            .find(|engine| engine.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnsupportedEngine {
                value: s.to_string(),
                supported: Self::SUPPORTED
                    .iter()
                    .map(|e| e.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment-variable prefix for an alias: `DB_` for `default`, else `DB_<ALIAS>_`.
pub fn env_prefix(alias: &str) -> String {
    if alias == DEFAULT_ALIAS {
        "DB_".to_string()
    } else {
        format!("DB_{}_", alias.to_ascii_uppercase())
    }
}

/// Optional privileged credentials used for user management and setup.
#[derive(Debug)]
pub struct AdminCredentials {
    pub user: String,
    pub password: SecretString,
}

/// Validated connection settings for one database alias.
///
/// Built once from the environment and never mutated afterwards.
pub struct DatabaseConfig {
    alias: String,
    engine: DatabaseEngine,
    host: String,
    port: u16,
    user: String,
    password: SecretString,
    name: String,
    admin_user: Option<String>,
    admin_password: Option<SecretString>,
    url: OnceCell<String>,
}

impl DatabaseConfig {
    /// Build the config for `alias` from its prefixed variables.
    pub fn from_env(vars: &EnvVars, alias: &str) -> Result<Self, ConfigError> {
        let prefix = env_prefix(alias);
        let key = |field: &str| format!("{prefix}{field}");

        let engine = match vars.get_trimmed(&key("ENGINE")) {
            Some(raw) => raw.parse()?,
            None => DatabaseEngine::default(),
        };
        let name = required(vars, &key("NAME"))?;
        let user = required(vars, &key("USER"))?;

        let password_key = key("PASSWORD");
        let password = match vars.get(&password_key) {
            Some(raw) if !raw.trim().is_empty() => SecretString::from(raw.to_string()),
            _ => return Err(ConfigError::missing(password_key)),
        };

        let host = vars
            .get_trimmed(&key("HOST"))
            .unwrap_or(DEFAULT_HOST)
            .to_string();
        let port = parse_port(vars, &key("PORT"))?;

        let admin_user = vars.get_trimmed(&key("ADMIN_USER")).map(str::to_string);
        let admin_password = vars
            .get(&key("ADMIN_PASSWORD"))
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.to_string()));

        Ok(Self {
            alias: alias.to_string(),
            engine,
            host,
            port,
            user,
            password,
            name,
            admin_user,
            admin_password,
            url: OnceCell::new(),
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn engine(&self) -> DatabaseEngine {
        self.engine
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admin user configured for this alias, if any.
    pub fn admin_user(&self) -> Option<&str> {
        self.admin_user.as_deref()
    }

    /// Admin credentials when both user and password are configured.
    pub fn admin_credentials(&self) -> Option<AdminCredentials> {
        match (&self.admin_user, &self.admin_password) {
            (Some(user), Some(password)) => Some(AdminCredentials {
                user: user.clone(),
                password: SecretString::from(password.expose_secret().to_string()),
            }),
            _ => None,
        }
    }

    /// Connection URL in the engine's canonical scheme. Computed once.
    ///
    /// Contains the password: never log it, use [`Self::redacted_url`].
    pub fn url(&self) -> &str {
        self.url
            .get_or_init(|| self.render_url(&encode(self.password.expose_secret())))
    }

    /// Connection URL with the password masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        self.render_url("***")
    }

    fn render_url(&self, encoded_password: &str) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}",
            self.engine.url_scheme(),
            encode(&self.user),
            encoded_password,
            url_host(&self.host),
            self.port,
            encode(&self.name),
        )
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("alias", &self.alias)
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("name", &self.name)
            .field("admin_user", &self.admin_user)
            .finish()
    }
}

fn required(vars: &EnvVars, key: &str) -> Result<String, ConfigError> {
    vars.get_trimmed(key)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::missing(key))
}

fn parse_port(vars: &EnvVars, key: &str) -> Result<u16, ConfigError> {
    let Some(raw) = vars.get_trimmed(key) else {
        return Ok(DEFAULT_PORT);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| ConfigError::invalid(key, raw, "an integer port number"))?;
    if !(1..=65535).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field: key.to_string(),
            value,
            min: 1,
            max: 65535,
        });
    }
    Ok(value as u16)
}

/// Percent-encode a URL userinfo or path component.
pub(crate) fn encode(component: &str) -> String {
    utf8_percent_encode(component, URL_COMPONENT).to_string()
}

/// Bracket IPv6 literals for use in a URL authority.
pub(crate) fn url_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}
