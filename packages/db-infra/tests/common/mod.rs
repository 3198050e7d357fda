#![allow(dead_code)]

// tests/common/mod.rs
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use db_infra::config::{ConfigRegistry, EnvVars};
use db_infra::error::{LifecycleError, SessionError};
use db_infra::infra::db::{
    AdminSession, ConnectParams, Connector, MigrationPlan, MigrationRunner, PromptError, Prompter,
    RolePrivileges,
};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

// Logging is auto-installed for every test binary that includes this module
#[ctor::ctor]
fn init_logging() {
    db_test_support::logging::init();
}

/// Replace (or add) `key` in a fixture set.
pub fn set_var(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    pairs.retain(|(k, _)| k != key);
    pairs.push((key.to_string(), value.to_string()));
}

pub fn registry(pairs: Vec<(String, String)>) -> ConfigRegistry {
    ConfigRegistry::from_vars(EnvVars::from_pairs(pairs))
}

/// Observable state of the in-memory server.
#[derive(Debug, Default)]
pub struct ClusterState {
    pub databases: BTreeSet<String>,
    pub roles: BTreeSet<String>,
    /// Users whose logins are refused.
    pub rejected_users: BTreeSet<String>,
    /// Reject `DROP DATABASE ... WITH (FORCE)` like servers before 13.
    pub legacy_drop: bool,
    /// Connection attempts never complete.
    pub hang_on_connect: bool,
    /// Every statement, in order.
    pub ops: Vec<String>,
    /// `user@dbname` for every accepted login.
    pub logins: Vec<String>,
    pub open_sessions: usize,
    pub public_tables: i64,
}

/// In-memory stand-in for a Postgres server.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(self, name: &str) -> Self {
        self.state.lock().unwrap().databases.insert(name.to_string());
        self
    }

    pub fn with_role(self, name: &str) -> Self {
        self.state.lock().unwrap().roles.insert(name.to_string());
        self
    }

    pub fn rejecting(self, user: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .rejected_users
            .insert(user.to_string());
        self
    }

    pub fn legacy_drop(self) -> Self {
        self.state.lock().unwrap().legacy_drop = true;
        self
    }

    pub fn hanging(self) -> Self {
        self.state.lock().unwrap().hang_on_connect = true;
        self
    }

    pub fn with_public_tables(self, count: i64) -> Self {
        self.state.lock().unwrap().public_tables = count;
        self
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.state.lock().unwrap().databases.contains(name)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.state.lock().unwrap().roles.contains(name)
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn logins(&self) -> Vec<String> {
        self.state.lock().unwrap().logins.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open_sessions
    }
}

#[async_trait]
impl Connector for FakeCluster {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn AdminSession>, SessionError> {
        let hang = self.state.lock().unwrap().hang_on_connect;
        if hang {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.rejected_users.contains(&params.user) {
            return Err(SessionError::Connect {
                message: format!(
                    "password authentication failed for user \"{}\"",
                    params.user
                ),
            });
        }
        if params.password.expose_secret().is_empty() {
            return Err(SessionError::Connect {
                message: "no password supplied".to_string(),
            });
        }
        state.logins.push(format!("{}@{}", params.user, params.dbname));
        state.open_sessions += 1;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeSession {
    fn record(&self, op: String) -> std::sync::MutexGuard<'_, ClusterState> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(op);
        state
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_sessions -= 1;
        }
    }
}

#[async_trait]
impl AdminSession for FakeSession {
    async fn database_exists(&self, name: &str) -> Result<bool, SessionError> {
        Ok(self.state.lock().unwrap().databases.contains(name))
    }

    async fn role_exists(&self, name: &str) -> Result<bool, SessionError> {
        Ok(self.state.lock().unwrap().roles.contains(name))
    }

    async fn create_database(&self, name: &str, owner: &str) -> Result<(), SessionError> {
        let mut state = self.record(format!("create database {name} owner {owner}"));
        if !state.databases.insert(name.to_string()) {
            return Err(SessionError::Statement {
                message: format!("database \"{name}\" already exists"),
            });
        }
        Ok(())
    }

    async fn drop_database(&self, name: &str, force: bool) -> Result<(), SessionError> {
        let op = if force {
            format!("drop database {name} force")
        } else {
            format!("drop database {name}")
        };
        let mut state = self.record(op);
        if force && state.legacy_drop {
            return Err(SessionError::UnsupportedSyntax {
                message: "syntax error at or near \"WITH\"".to_string(),
            });
        }
        state.databases.remove(name);
        Ok(())
    }

    async fn terminate_database_sessions(&self, name: &str) -> Result<u64, SessionError> {
        self.record(format!("terminate database {name}"));
        Ok(2)
    }

    async fn terminate_role_sessions(&self, role: &str) -> Result<u64, SessionError> {
        self.record(format!("terminate role {role}"));
        Ok(0)
    }

    async fn create_role(
        &self,
        name: &str,
        _password: &SecretString,
        privileges: RolePrivileges,
    ) -> Result<(), SessionError> {
        let mut state = self.record(format!("create user {name} {}", privileges.sql()));
        if !state.roles.insert(name.to_string()) {
            return Err(SessionError::Statement {
                message: format!("role \"{name}\" already exists"),
            });
        }
        Ok(())
    }

    async fn drop_role(&self, name: &str) -> Result<(), SessionError> {
        let mut state = self.record(format!("drop user {name}"));
        state.roles.remove(name);
        Ok(())
    }

    async fn grant_all(&self, database: &str, role: &str) -> Result<(), SessionError> {
        self.record(format!("grant {database} to {role}"));
        Ok(())
    }

    async fn server_version(&self) -> Result<String, SessionError> {
        Ok("PostgreSQL 16.4 on x86_64-pc-linux-gnu, compiled by gcc".to_string())
    }

    async fn public_table_count(&self) -> Result<i64, SessionError> {
        Ok(self.state.lock().unwrap().public_tables)
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Answers prompts from a script and records every question asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
    cancel_on_answer: Option<CancellationToken>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Cancel `token` as soon as the first question is answered, like an
    /// operator pressing Ctrl-C right after confirming.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_answer = Some(token);
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str) -> Result<String, PromptError> {
        self.asked.lock().unwrap().push(prompt.to_string());
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| PromptError::Io(format!("unexpected prompt: {prompt}")))?;
        if let Some(token) = &self.cancel_on_answer {
            token.cancel();
        }
        Ok(answer)
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let answer = self.next(prompt)?;
        Ok(match (answer.is_empty(), default) {
            (true, Some(default)) => default.to_string(),
            _ => answer,
        })
    }

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError> {
        let answer = self.next(prompt)?;
        Ok(match answer.as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    fn password(&self, prompt: &str) -> Result<SecretString, PromptError> {
        Ok(SecretString::from(self.next(prompt)?))
    }
}

/// Records migrations instead of running them.
#[derive(Debug, Default)]
pub struct RecordingMigrator {
    migrated: Mutex<Vec<String>>,
    failing: BTreeSet<String>,
    plan: MigrationPlan,
    plan_broken: bool,
}

impl RecordingMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, alias: &str) -> Self {
        self.failing.insert(alias.to_string());
        self
    }

    pub fn with_plan(mut self, applied: usize, pending: usize) -> Self {
        self.plan = MigrationPlan { applied, pending };
        self
    }

    /// The plan command fails for every alias.
    pub fn without_plan(mut self) -> Self {
        self.plan_broken = true;
        self
    }

    pub fn migrated(&self) -> Vec<String> {
        self.migrated.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigrationRunner for RecordingMigrator {
    async fn migrate(&self, alias: &str) -> Result<(), LifecycleError> {
        if self.failing.contains(alias) {
            return Err(LifecycleError::MigrationFailed {
                code: Some(1),
                stderr: format!("relation missing while migrating {alias}"),
            });
        }
        self.migrated.lock().unwrap().push(alias.to_string());
        Ok(())
    }

    async fn plan(&self, _alias: &str) -> Result<MigrationPlan, LifecycleError> {
        if self.plan_broken {
            return Err(LifecycleError::MigrationFailed {
                code: None,
                stderr: "plan command timed out after 10s".to_string(),
            });
        }
        Ok(self.plan)
    }
}
