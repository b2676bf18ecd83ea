//! Logging setup for native hosts.
//!
//! Library code only emits `tracing` events; binaries and tests decide where
//! they go. In the browser no subscriber is installed and events are dropped.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing with recstore defaults.
///
/// Sets up tracing-subscriber with:
/// - Environment filter (RUST_LOG)
/// - Compact format suitable for terminal output
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with a custom default filter.
pub fn init_with_filter(default_filter: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(fmt::layer().compact())
        .init();
}

/// Install a test-friendly subscriber; later calls are no-ops.
pub fn try_init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(env_filter("recstore_core=debug"))
        .with(fmt::layer().compact().with_test_writer())
        .try_init();
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}
