//! Per-alias outcomes of a fan-out, collected as a value.

use std::fmt;

use crate::error::{LifecycleError, EXIT_FAILURE, EXIT_GUARD_BLOCKED, EXIT_INTERRUPTED, EXIT_OK};

/// How one alias's workflow ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(String),
    /// Nothing to do (e.g. dropping an absent database).
    NoOp(String),
    /// The operator declined a confirmation.
    Cancelled(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Outcome::Completed(m) | Outcome::NoOp(m) | Outcome::Cancelled(m) => m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasReport {
    pub alias: String,
    pub result: Result<Outcome, LifecycleError>,
}

impl AliasReport {
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(_) => EXIT_OK,
            Err(e) => e.exit_code(),
        }
    }
}

/// Everything a fan-out attempted, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    operation: String,
    entries: Vec<AliasReport>,
    not_attempted: Vec<String>,
}

impl BatchOutcome {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            entries: Vec::new(),
            not_attempted: Vec::new(),
        }
    }

    pub fn push(&mut self, alias: impl Into<String>, result: Result<Outcome, LifecycleError>) {
        self.entries.push(AliasReport {
            alias: alias.into(),
            result,
        });
    }

    /// Record aliases skipped because the run was interrupted.
    pub fn skip_remaining<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_attempted.extend(aliases.into_iter().map(Into::into));
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn entries(&self) -> &[AliasReport] {
        &self.entries
    }

    pub fn entry(&self, alias: &str) -> Option<&AliasReport> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    pub fn not_attempted(&self) -> &[String] {
        &self.not_attempted
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &LifecycleError)> {
        self.entries.iter().filter_map(|e| match &e.result {
            Err(err) => Some((e.alias.as_str(), err)),
            Ok(_) => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == EXIT_OK
    }

    /// Highest-priority code among the entries: interrupt, then guard block,
    /// then failure, then success. Aliases left unattempted imply an interrupt.
    pub fn exit_code(&self) -> i32 {
        if !self.not_attempted.is_empty() {
            return EXIT_INTERRUPTED;
        }
        self.entries
            .iter()
            .map(AliasReport::exit_code)
            .max_by_key(|code| priority(*code))
            .unwrap_or(EXIT_OK)
    }

    pub fn summary(&self) -> String {
        let mut completed = 0;
        let mut no_op = 0;
        let mut cancelled = 0;
        let mut failed = 0;
        for entry in &self.entries {
            match &entry.result {
                Ok(Outcome::Completed(_)) => completed += 1,
                Ok(Outcome::NoOp(_)) => no_op += 1,
                Ok(Outcome::Cancelled(_)) => cancelled += 1,
                Err(_) => failed += 1,
            }
        }
        let mut summary = format!(
            "{}: {completed} completed, {no_op} unchanged, {cancelled} cancelled, {failed} failed",
            self.operation
        );
        if !self.not_attempted.is_empty() {
            summary.push_str(&format!(
                ", not attempted: {}",
                self.not_attempted.join(", ")
            ));
        }
        summary
    }
}

fn priority(code: i32) -> u8 {
    match code {
        EXIT_INTERRUPTED => 3,
        EXIT_GUARD_BLOCKED => 2,
        EXIT_FAILURE => 1,
        _ => 0,
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match &entry.result {
                Ok(outcome) => writeln!(f, "[{}] {}", entry.alias, outcome.message())?,
                Err(e) => writeln!(f, "[{}] error: {e}", entry.alias)?,
            }
        }
        write!(f, "{}", self.summary())
    }
}
