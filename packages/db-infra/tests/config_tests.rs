//! Registry resolution from the process environment and `.env` files.

mod common;

use std::io::Write;

use db_infra::config::{ConfigRegistry, DatabaseConfig, EnvState, EnvVars, FrameworkConfig};
use db_infra::error::ConfigError;
use db_test_support::fixtures::{database_vars, multi_database_vars, strong_secret_key};
use percent_encoding::percent_decode_str;
use secrecy::ExposeSecret;
use serial_test::serial;
use url::Url;

const PROCESS_KEYS: [&str; 6] = [
    "ENV_STATE",
    "DB_ALIASES",
    "DB_NAME",
    "DB_USER",
    "DB_PASSWORD",
    "APP_SECRET_KEY",
];

/// Clears the variables these tests touch on construction and on drop.
struct ProcessEnv;

impl ProcessEnv {
    fn clean() -> Self {
        for key in PROCESS_KEYS {
            std::env::remove_var(key);
        }
        Self
    }

    fn set(&self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }
}

impl Drop for ProcessEnv {
    fn drop(&mut self) {
        for key in PROCESS_KEYS {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn process_registry_snapshots_until_reloaded() {
    let env = ProcessEnv::clean();
    env.set("DB_NAME", "first");
    env.set("DB_USER", "owner");
    env.set("DB_PASSWORD", "pw");

    let registry = ConfigRegistry::from_process();
    assert_eq!(registry.database("default").unwrap().name(), "first");

    env.set("DB_NAME", "second");
    assert_eq!(registry.database("default").unwrap().name(), "first");

    let reloaded = registry.reload().unwrap();
    assert_eq!(reloaded.database("default").unwrap().name(), "second");
}

#[test]
#[serial]
fn env_file_fills_gaps_but_process_wins() {
    let env = ProcessEnv::clean();
    env.set("DB_NAME", "from_process");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "DB_NAME=from_file").unwrap();
    writeln!(file, "DB_USER=file_owner").unwrap();
    writeln!(file, "DB_PASSWORD=\"quoted pw\"").unwrap();
    file.flush().unwrap();

    let registry = ConfigRegistry::from_process_with_file(file.path()).unwrap();
    let db = registry.database("default").unwrap();
    assert_eq!(db.name(), "from_process");
    assert_eq!(db.user(), "file_owner");
    assert_eq!(db.password().expose_secret(), "quoted pw");

    // `dotenvy` never mutates the process environment on this path
    assert!(std::env::var("DB_USER").is_err());
}

#[test]
#[serial]
fn missing_env_file_is_not_an_error() {
    let env = ProcessEnv::clean();
    env.set("ENV_STATE", "production");

    let dir = tempfile::tempdir().unwrap();
    let registry = ConfigRegistry::from_process_with_file(&dir.path().join(".env")).unwrap();
    assert_eq!(registry.env_state().unwrap(), EnvState::Production);
}

#[test]
fn production_registry_validates_secret_key_lazily() {
    let mut pairs = multi_database_vars(&["default"]);
    pairs.push(("ENV_STATE".to_string(), "production".to_string()));
    pairs.push(("APP_SECRET_KEY".to_string(), "abc123abc1".to_string()));
    let weak = ConfigRegistry::from_vars(EnvVars::from_pairs(pairs.clone()));

    // Databases resolve even though the framework settings are rejected
    assert!(weak.database("default").is_ok());
    match weak.framework().unwrap_err() {
        ConfigError::WeakSecret { field, message } => {
            assert_eq!(field, "APP_SECRET_KEY");
            assert!(message.contains("length 10"));
            assert!(message.contains("strength score"));
        }
        other => panic!("unexpected error: {other}"),
    }

    pairs.retain(|(k, _)| k != "APP_SECRET_KEY");
    pairs.push(("APP_SECRET_KEY".to_string(), strong_secret_key()));
    let strong = ConfigRegistry::from_vars(EnvVars::from_pairs(pairs));
    assert!(matches!(strong.framework().unwrap(), FrameworkConfig::Prod(_)));
    assert!(!strong.framework().unwrap().debug());
}

fn assert_url_round_trips(config: &DatabaseConfig) {
    let url = Url::parse(config.url()).unwrap();
    let decode = |s: &str| percent_decode_str(s).decode_utf8().unwrap().into_owned();

    assert_eq!(url.scheme(), "postgresql");
    let host = url.host_str().unwrap();
    assert_eq!(host.trim_start_matches('[').trim_end_matches(']'), config.host());
    assert_eq!(url.port_or_known_default(), Some(config.port()));
    assert_eq!(decode(url.username()), config.user());
    assert_eq!(decode(url.password().unwrap()), config.password().expose_secret());
    assert_eq!(decode(url.path().trim_start_matches('/')), config.name());
}

#[test]
fn connection_url_round_trips_through_a_url_parser() {
    let cases: [&[(&str, &str)]; 3] = [
        &[],
        &[("DB_HOST", "db.internal"), ("DB_PORT", "6543")],
        &[
            ("DB_HOST", "::1"),
            ("DB_USER", "ops@team"),
            ("DB_PASSWORD", "p@ss:w/rd#1"),
            ("DB_NAME", "app data"),
        ],
    ];

    for overrides in cases {
        let mut pairs = database_vars("default");
        for (key, value) in overrides {
            pairs.retain(|(k, _)| k != key);
            pairs.push((key.to_string(), value.to_string()));
        }
        let vars = EnvVars::from_pairs(pairs);
        let config = DatabaseConfig::from_env(&vars, "default").unwrap();
        assert_url_round_trips(&config);
        assert!(!config.redacted_url().contains(config.password().expose_secret()));
    }
}
