//! Production safety guard for destructive operations.

use tracing::warn;

use crate::config::env_state::EnvState;
use crate::error::{LifecycleError, ObjectKind};
use crate::infra::db::prompt::Prompter;

/// Outcome of evaluating the guard for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Block { operation: String },
}

impl GuardDecision {
    /// Blocks iff production and no override was requested.
    pub fn evaluate(is_production: bool, override_requested: bool, operation: &str) -> Self {
        if is_production && !override_requested {
            GuardDecision::Block {
                operation: operation.to_string(),
            }
        } else {
            GuardDecision::Allow
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    pub fn into_result(self) -> Result<(), LifecycleError> {
        match self {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Block { operation } => Err(LifecycleError::guard_blocked(operation)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionGuard {
    state: EnvState,
}

impl ProductionGuard {
    pub fn new(state: EnvState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn check(&self, operation: &str, override_requested: bool) -> GuardDecision {
        GuardDecision::evaluate(self.state.is_production(), override_requested, operation)
    }

    /// [`Self::check`] as a `Result`, logging the block.
    pub fn require(&self, operation: &str, override_requested: bool) -> Result<(), LifecycleError> {
        let decision = self.check(operation, override_requested);
        if !decision.is_allowed() {
            warn!(
                operation,
                env = %self.state,
                "guard=blocked use --allow-in-production to override"
            );
        }
        decision.into_result()
    }

    /// Operator-visible warning ahead of a destructive step. No effect on control flow.
    pub fn warn_destructive(&self, operation: &str, target: &str) {
        warn!(
            env = %self.state.as_str().to_uppercase(),
            operation,
            target,
            "DESTRUCTIVE OPERATION: this action cannot be undone"
        );
    }
}

/// Result of a confirmation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// Ask the operator to re-type `expected` exactly. Skipped with `force`.
///
/// A mismatch is a cancellation, not an error.
pub fn require_typed_confirmation(
    prompter: &dyn Prompter,
    kind: ObjectKind,
    expected: &str,
    force: bool,
) -> Result<Confirmation, LifecycleError> {
    if force {
        return Ok(Confirmation::Confirmed);
    }
    let noun = kind.to_string().to_lowercase();
    let typed = prompter.input(&format!("Type the {noun} name '{expected}' to confirm"), None)?;
    if typed == expected {
        Ok(Confirmation::Confirmed)
    } else {
        warn!(expected, "{kind} name mismatch. Aborted.");
        Ok(Confirmation::Cancelled)
    }
}

/// Yes/no confirmation. Skipped with `force`.
pub fn require_confirmation(
    prompter: &dyn Prompter,
    question: &str,
    default: bool,
    force: bool,
) -> Result<Confirmation, LifecycleError> {
    if force || prompter.confirm(question, default)? {
        Ok(Confirmation::Confirmed)
    } else {
        Ok(Confirmation::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use secrecy::SecretString;

    use super::*;
    use crate::infra::db::prompt::PromptError;

    struct Answers(Mutex<Vec<String>>);

    impl Prompter for Answers {
        fn input(&self, _prompt: &str, _default: Option<&str>) -> Result<String, PromptError> {
            Ok(self.0.lock().unwrap().remove(0))
        }

        fn confirm(&self, _prompt: &str, default: bool) -> Result<bool, PromptError> {
            Ok(default)
        }

        fn password(&self, _prompt: &str) -> Result<SecretString, PromptError> {
            Err(PromptError::Interrupted)
        }
    }

    fn answers(items: &[&str]) -> Answers {
        Answers(Mutex::new(items.iter().map(|s| s.to_string()).collect()))
    }

    #[test]
    fn guard_truth_table() {
        for (production, override_requested, allowed) in [
            (false, false, true),
            (false, true, true),
            (true, false, false),
            (true, true, true),
        ] {
            let decision = GuardDecision::evaluate(production, override_requested, "drop database");
            assert_eq!(decision.is_allowed(), allowed, "{production}/{override_requested}");
        }
    }

    #[test]
    fn block_carries_the_operation_name() {
        let guard = ProductionGuard::new(EnvState::Production);
        let err = guard.require("reset database", false).unwrap_err();
        assert_eq!(err, LifecycleError::guard_blocked("reset database"));
        assert!(err.to_string().contains("'reset database'"));
        assert!(guard.require("reset database", true).is_ok());
    }

    #[test]
    fn typed_confirmation_requires_exact_match() {
        let prompter = answers(&["app", "App"]);
        assert_eq!(
            require_typed_confirmation(&prompter, ObjectKind::Database, "app", false).unwrap(),
            Confirmation::Confirmed
        );
        assert_eq!(
            require_typed_confirmation(&prompter, ObjectKind::Database, "app", false).unwrap(),
            Confirmation::Cancelled
        );
    }

    #[test]
    fn force_skips_every_prompt() {
        let prompter = answers(&[]);
        assert_eq!(
            require_typed_confirmation(&prompter, ObjectKind::User, "owner", true).unwrap(),
            Confirmation::Confirmed
        );
        assert_eq!(
            require_confirmation(&prompter, "Continue?", false, true).unwrap(),
            Confirmation::Confirmed
        );
    }
}
