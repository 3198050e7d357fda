//! Lazily constructed, per-environment configuration variants.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::config::env_state::EnvState;
use crate::error::ConfigError;

type Constructor<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

struct Slot<T, E> {
    construct: Constructor<T, E>,
    cell: OnceCell<T>,
}

/// Maps each [`EnvState`] to a constructor and memoizes the result.
///
/// A variant is only built the first time its state is requested, so the
/// validation of variants for other environments never runs. Failed
/// constructions are not cached; the next request retries.
pub struct EnvKeyed<T, E = ConfigError> {
    slots: HashMap<EnvState, Slot<T, E>>,
}

impl<T, E> EnvKeyed<T, E> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Register the constructor for `state`, replacing any previous one.
    pub fn with<F>(mut self, state: EnvState, construct: F) -> Self
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        self.slots.insert(
            state,
            Slot {
                construct: Box::new(construct),
                cell: OnceCell::new(),
            },
        );
        self
    }

    /// Memoized instance for `state`.
    ///
    /// # Panics
    ///
    /// Panics if no constructor was registered for `state`. That is a wiring
    /// mistake in the caller, not a runtime condition.
    pub fn get(&self, state: EnvState) -> Result<&T, E> {
        let Some(slot) = self.slots.get(&state) else {
            panic!("no configuration variant registered for environment state '{state}'");
        };
        slot.cell.get_or_try_init(|| (slot.construct)())
    }

    /// Whether the variant for `state` has been built.
    pub fn is_constructed(&self, state: EnvState) -> bool {
        self.slots
            .get(&state)
            .is_some_and(|slot| slot.cell.get().is_some())
    }
}

impl<T, E> Default for EnvKeyed<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for EnvKeyed<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut states: Vec<_> = self.slots.keys().map(|s| s.as_str()).collect();
        states.sort_unstable();
        f.debug_struct("EnvKeyed").field("states", &states).finish()
    }
}
