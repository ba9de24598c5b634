//! Process-wide tracing/logging setup shared by binaries and test
//! harnesses.

/// Tracing configuration (filters, output format).
pub mod tracing;

/// Initialize process-wide observability with defaults.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}
