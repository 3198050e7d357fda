//! Operator interaction seam.

use secrecy::SecretString;
use thiserror::Error;

use crate::error::LifecycleError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    /// The operator aborted the prompt (Ctrl-C / EOF).
    #[error("prompt interrupted")]
    Interrupted,

    #[error("{0}")]
    Io(String),
}

impl From<PromptError> for LifecycleError {
    fn from(e: PromptError) -> Self {
        match e {
            PromptError::Interrupted => LifecycleError::Interrupted,
            PromptError::Io(detail) => LifecycleError::Prompt { detail },
        }
    }
}

/// Questions the lifecycle workflows ask the operator.
///
/// Implementations block until the operator answers.
pub trait Prompter: Send + Sync {
    /// Free-text answer. `default` is returned for an empty answer.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, PromptError>;

    /// Hidden answer.
    fn password(&self, prompt: &str) -> Result<SecretString, PromptError>;
}

/// Prompter for unattended runs: every question is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn input(&self, prompt: &str, _default: Option<&str>) -> Result<String, PromptError> {
        Err(unattended(prompt))
    }

    fn confirm(&self, prompt: &str, _default: bool) -> Result<bool, PromptError> {
        Err(unattended(prompt))
    }

    fn password(&self, prompt: &str) -> Result<SecretString, PromptError> {
        Err(unattended(prompt))
    }
}

fn unattended(prompt: &str) -> PromptError {
    PromptError::Io(format!(
        "cannot ask '{prompt}' without a terminal; pass --force or configure the value"
    ))
}
