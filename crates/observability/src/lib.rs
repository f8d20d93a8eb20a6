//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(&tracing::TracingConfig::from_env());
}

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingConfig, init_with};
