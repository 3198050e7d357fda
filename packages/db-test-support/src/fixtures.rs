//! Environment fixtures.
//!
//! Every helper returns plain `(key, value)` pairs so tests can build
//! isolated configuration snapshots without touching the process env.

use db_infra::config::database::{env_prefix, DEFAULT_ALIAS};

/// A complete, valid set of variables for one alias.
pub fn database_vars(alias: &str) -> Vec<(String, String)> {
    let prefix = env_prefix(alias);
    let name = if alias == DEFAULT_ALIAS {
        "app".to_string()
    } else {
        format!("app_{alias}")
    };
    vec![
        (format!("{prefix}NAME"), name),
        (format!("{prefix}USER"), format!("{alias}_owner")),
        (format!("{prefix}PASSWORD"), format!("{alias}-password")),
        (format!("{prefix}HOST"), "localhost".to_string()),
        (format!("{prefix}PORT"), "5432".to_string()),
    ]
}

/// Admin credentials for an alias, so lifecycle tests never prompt for them.
pub fn admin_vars(alias: &str) -> Vec<(String, String)> {
    let prefix = env_prefix(alias);
    vec![
        (format!("{prefix}ADMIN_USER"), "postgres".to_string()),
        (format!("{prefix}ADMIN_PASSWORD"), "postgres-admin".to_string()),
    ]
}

/// Variables for every alias in `aliases` plus the `DB_ALIASES` declaration.
pub fn multi_database_vars(aliases: &[&str]) -> Vec<(String, String)> {
    let mut vars = vec![("DB_ALIASES".to_string(), aliases.join(","))];
    for alias in aliases {
        vars.extend(database_vars(alias));
        vars.extend(admin_vars(alias));
    }
    vars
}

/// A production secret key that clears the strength policy.
pub fn strong_secret_key() -> String {
    "q7#Vt2!mLx9@Rb4$Zk8^Wn3&Hc6*Pf1(Jd5)Gs0_Ye-Ua+Io=Ek".to_string()
}
