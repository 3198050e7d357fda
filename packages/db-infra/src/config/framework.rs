//! Application framework settings, one variant per environment state.

use secrecy::SecretString;

use crate::config::env::EnvVars;
use crate::config::env_state::EnvState;
use crate::error::ConfigError;

pub const SECRET_KEY_VAR: &str = "APP_SECRET_KEY";
pub const DEBUG_VAR: &str = "APP_DEBUG";
pub const ALLOWED_HOSTS_VAR: &str = "APP_ALLOWED_HOSTS";

/// Minimum secret key length accepted in production.
pub const MIN_SECRET_KEY_LEN: usize = 50;
/// Minimum strength score (0..=4) accepted in production.
pub const MIN_SECRET_KEY_SCORE: u8 = 3;

/// Development settings: debug on, every host allowed, no key policy.
#[derive(Debug)]
pub struct DevFrameworkConfig {
    pub secret_key: SecretString,
    pub debug: bool,
    pub allowed_hosts: Vec<String>,
}

/// Production settings: debug off, explicit hosts, strong secret key.
#[derive(Debug)]
pub struct ProdFrameworkConfig {
    pub secret_key: SecretString,
    pub debug: bool,
    pub allowed_hosts: Vec<String>,
}

/// Framework settings selected once for the resolved environment.
#[derive(Debug)]
pub enum FrameworkConfig {
    Dev(DevFrameworkConfig),
    Prod(ProdFrameworkConfig),
}

impl FrameworkConfig {
    pub fn development(vars: &EnvVars) -> Result<Self, ConfigError> {
        let secret_key = vars.get(SECRET_KEY_VAR).unwrap_or_default();
        Ok(FrameworkConfig::Dev(DevFrameworkConfig {
            secret_key: SecretString::from(secret_key.to_string()),
            debug: vars.get_bool(DEBUG_VAR)?.unwrap_or(true),
            allowed_hosts: vars
                .get_list(ALLOWED_HOSTS_VAR)?
                .unwrap_or_else(|| vec!["*".to_string()]),
        }))
    }

    pub fn production(vars: &EnvVars) -> Result<Self, ConfigError> {
        let secret_key = vars.get(SECRET_KEY_VAR).unwrap_or_default();
        validate_production_secret(SECRET_KEY_VAR, secret_key)?;

        Ok(FrameworkConfig::Prod(ProdFrameworkConfig {
            secret_key: SecretString::from(secret_key.to_string()),
            debug: vars.get_bool(DEBUG_VAR)?.unwrap_or(false),
            allowed_hosts: vars.get_list(ALLOWED_HOSTS_VAR)?.unwrap_or_default(),
        }))
    }

    pub fn state(&self) -> EnvState {
        match self {
            FrameworkConfig::Dev(_) => EnvState::Development,
            FrameworkConfig::Prod(_) => EnvState::Production,
        }
    }

    pub fn debug(&self) -> bool {
        match self {
            FrameworkConfig::Dev(c) => c.debug,
            FrameworkConfig::Prod(c) => c.debug,
        }
    }

    pub fn allowed_hosts(&self) -> &[String] {
        match self {
            FrameworkConfig::Dev(c) => &c.allowed_hosts,
            FrameworkConfig::Prod(c) => &c.allowed_hosts,
        }
    }

    pub fn secret_key(&self) -> &SecretString {
        match self {
            FrameworkConfig::Dev(c) => &c.secret_key,
            FrameworkConfig::Prod(c) => &c.secret_key,
        }
    }
}

/// Enforce the production key policy: minimum length and minimum strength.
///
/// Every shortfall is reported together with estimator feedback and a
/// remediation hint.
pub fn validate_production_secret(field: &str, secret: &str) -> Result<(), ConfigError> {
    if secret.is_empty() {
        return Err(ConfigError::WeakSecret {
            field: field.to_string(),
            message: format!(
                "must not be empty in production. Hint: {}",
                remediation_hint()
            ),
        });
    }

    let length = secret.chars().count();
    let estimate = zxcvbn::zxcvbn(secret, &[]);
    let score = u8::from(estimate.score());

    let mut problems = Vec::new();
    if length < MIN_SECRET_KEY_LEN {
        problems.push(format!(
            "length {length} is below the minimum of {MIN_SECRET_KEY_LEN} characters"
        ));
    }
    if score < MIN_SECRET_KEY_SCORE {
        problems.push(format!(
            "strength score {score}/4 is below the required {MIN_SECRET_KEY_SCORE}/4"
        ));
    }
    if problems.is_empty() {
        return Ok(());
    }

    let mut message = format!("too weak for production: {}.", problems.join("; "));
    if let Some(feedback) = estimate.feedback() {
        if let Some(warning) = feedback.warning() {
            message.push_str(&format!(" {}.", warning.to_string().trim_end_matches('.')));
        }
        let suggestions: Vec<String> = feedback
            .suggestions()
            .iter()
            .map(|s| s.to_string().trim_end_matches('.').to_string())
            .collect();
        if !suggestions.is_empty() {
            message.push_str(&format!(" Suggestions: {}.", suggestions.join("; ")));
        }
    }
    message.push_str(&format!(" Hint: {}", remediation_hint()));

    Err(ConfigError::WeakSecret {
        field: field.to_string(),
        message,
    })
}

fn remediation_hint() -> &'static str {
    "generate a random value of at least 50 characters, e.g. `openssl rand -base64 48`"
}
