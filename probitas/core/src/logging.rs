use std::{env, sync::LazyLock};

use tracing_subscriber::EnvFilter;

pub static IS_DEBUG_TRACING: LazyLock<bool> = LazyLock::new(|| {
    env::var("PROBITAS_TESTS_TRACING").is_ok_and(|val| val.eq_ignore_ascii_case("true"))
});

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}

/// Captured-output subscriber for tests, installed only when
/// `PROBITAS_TESTS_TRACING=true`.
pub fn init_test_tracing() {
    if !*IS_DEBUG_TRACING {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_test_writer()
        .try_init();
}
