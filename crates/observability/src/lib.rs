//! Process-wide tracing setup shared by binaries and tests.

/// Initialize process-wide observability (tracing/logging).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Like [`init`], but with human-readable output for local runs.
pub fn init_pretty() {
    tracing::init_pretty();
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
