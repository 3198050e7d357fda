//! Label-based database routing.
//!
//! Every application-domain label has exactly one home alias. System labels
//! are pinned to `default`, explicitly routed labels live on their mapped
//! alias, and everything else falls back to `default`.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::aliases::DatabaseConfigs;
use crate::config::database::DEFAULT_ALIAS;
use crate::config::env::EnvVars;
use crate::error::ConfigError;

/// Variable holding `label=alias` route entries.
pub const ROUTES_VAR: &str = "DB_ROUTES";

/// Framework-owned labels that only ever live on `default`.
pub const DEFAULT_SYSTEM_LABELS: [&str; 6] = [
    "admin",
    "auth",
    "contenttypes",
    "sessions",
    "messages",
    "staticfiles",
];

/// Static label → alias assignments plus the pinned system labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMap {
    routes: BTreeMap<String, String>,
    system_labels: BTreeSet<String>,
}

impl Default for RouteMap {
    fn default() -> Self {
        Self {
            routes: BTreeMap::new(),
            system_labels: DEFAULT_SYSTEM_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl RouteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `label` to `alias`.
    ///
    /// System labels cannot be rerouted: they would otherwise be read on one
    /// alias and migrated on another.
    pub fn route(
        mut self,
        label: impl Into<String>,
        alias: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let label = label.into();
        if self.system_labels.contains(&label) {
            return Err(ConfigError::invalid(
                "route",
                format!("{label} -> {}", alias.into()),
                format!("a non-system label (system labels are pinned to '{DEFAULT_ALIAS}')"),
            ));
        }
        self.routes.insert(label, alias.into());
        Ok(self)
    }

    pub fn from_pairs<I, L, A>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (L, A)>,
        L: Into<String>,
        A: Into<String>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |map, (label, alias)| map.route(label, alias))
    }

    /// Routes declared in `DB_ROUTES` (comma list or JSON array of
    /// `label=alias`). Unset means no explicit routes.
    pub fn from_env(vars: &EnvVars) -> Result<Self, ConfigError> {
        let entries = vars.get_list(ROUTES_VAR)?.unwrap_or_default();
        let mut pairs = Vec::with_capacity(entries.len());
        for entry in &entries {
            match entry.split_once('=') {
                Some((label, alias)) if !label.trim().is_empty() && !alias.trim().is_empty() => {
                    pairs.push((label.trim().to_string(), alias.trim().to_string()));
                }
                _ => return Err(ConfigError::invalid(ROUTES_VAR, entry, "label=alias")),
            }
        }
        Self::from_pairs(pairs)
    }

    pub fn is_system(&self, label: &str) -> bool {
        self.system_labels.contains(label)
    }

    pub fn routed_alias(&self, label: &str) -> Option<&str> {
        self.routes.get(label).map(String::as_str)
    }

    /// The single alias `label` lives on.
    pub fn home_alias(&self, label: &str) -> &str {
        if self.is_system(label) {
            return DEFAULT_ALIAS;
        }
        self.routed_alias(label).unwrap_or(DEFAULT_ALIAS)
    }

    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().map(|(l, a)| (l.as_str(), a.as_str()))
    }
}

/// Read/write/relation/migration decisions over a [`RouteMap`].
#[derive(Debug, Clone, Default)]
pub struct DatabaseRouter {
    map: RouteMap,
}

impl DatabaseRouter {
    pub fn new(map: RouteMap) -> Self {
        Self { map }
    }

    pub fn route_map(&self) -> &RouteMap {
        &self.map
    }

    pub fn db_for_read(&self, label: &str) -> &str {
        self.map.home_alias(label)
    }

    pub fn db_for_write(&self, label: &str) -> &str {
        self.map.home_alias(label)
    }

    /// Relations are only allowed between labels living on the same alias.
    pub fn allow_relation(&self, left: &str, right: &str) -> bool {
        self.map.home_alias(left) == self.map.home_alias(right)
    }

    /// Whether migrations for `label` may run on `alias`.
    pub fn allow_migrate(&self, alias: &str, label: &str) -> bool {
        self.map.home_alias(label) == alias
    }

    /// Routes that point at aliases the registry did not load.
    pub fn validate_against(&self, databases: &DatabaseConfigs) -> Vec<String> {
        self.map
            .routes()
            .filter(|(_, alias)| !databases.contains(alias))
            .map(|(label, alias)| {
                format!(
                    "label '{label}' is routed to alias '{alias}', which is not configured \
                     (available: {})",
                    databases.aliases().collect::<Vec<_>>().join(", ")
                )
            })
            .collect()
    }
}
