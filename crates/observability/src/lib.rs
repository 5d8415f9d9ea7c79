//! Shared tracing/logging setup for the pipeline binaries.

use tracing_subscriber::EnvFilter;

/// Initialize tracing with `info` as the default level.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter("info");
}

/// Initialize tracing with an explicit default filter, still
/// overridable through `RUST_LOG`.
///
/// JSON output: the pipeline's logs are consumed by collectors, not
/// read off a terminal.
pub fn init_with_filter(default: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
