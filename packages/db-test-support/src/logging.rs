//! Test logging shared by unit and integration tests.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Driver targets that would otherwise log every admin statement.
const QUIET_DRIVERS: &str = "sqlx=warn,sea_orm=warn";

/// Filter directives for test runs.
///
/// `TEST_LOG` wins over `RUST_LOG`; with neither set only warnings are shown.
/// Driver noise stays at `warn` unless the directives name those targets.
pub fn test_filter(test_log: Option<&str>, rust_log: Option<&str>) -> String {
    let requested = test_log
        .or(rust_log)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("warn");
    if requested.contains("sqlx") || requested.contains("sea_orm") {
        requested.to_string()
    } else {
        format!("{requested},{QUIET_DRIVERS}")
    }
}

/// Install the test subscriber once per process. Safe to call from every test.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let test_log = std::env::var("TEST_LOG").ok();
        let rust_log = std::env::var("RUST_LOG").ok();
        let filter = EnvFilter::try_new(test_filter(test_log.as_deref(), rust_log.as_deref()))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .with_target(false)
            .try_init()
            .ok();
    });
}
