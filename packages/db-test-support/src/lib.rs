//! Test support for the db-infra workspace
//!
//! Unified logging initialization plus environment fixtures that describe a
//! valid configuration for one or more database aliases.

pub mod fixtures;
pub mod logging;
