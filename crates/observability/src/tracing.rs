//! Tracing/logging initialization.
//!
//! JSON output with targets enabled, so ledger posts and workflow
//! transitions can be filtered per crate via `RUST_LOG`
//! (e.g. `RUST_LOG=stockforge_ledger=debug`).

use tracing_subscriber::EnvFilter;

/// Initialize with `RUST_LOG` or an `info` default.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    );
}

/// Initialize with an explicit filter; used by tests that want a
/// deterministic level regardless of the environment.
pub fn init_with_filter(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}
