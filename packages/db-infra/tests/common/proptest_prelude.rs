// Proptest settings for the routing properties.
//
// PROPTEST_CASES overrides the case count (default 8); PROPTEST_MAX_SHRINK_MS
// caps shrinking. Inputs are generated valid; no prop_assume!.

fn proptest_env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok()?.trim().parse().ok()
}

pub fn proptest_prelude_config() -> proptest::prelude::ProptestConfig {
    let base = proptest::prelude::ProptestConfig::default();
    proptest::prelude::ProptestConfig {
        failure_persistence: None,
        cases: proptest_env_u32("PROPTEST_CASES").unwrap_or(8).max(1),
        max_shrink_time: proptest_env_u32("PROPTEST_MAX_SHRINK_MS").unwrap_or(base.max_shrink_time),
        ..base
    }
}
