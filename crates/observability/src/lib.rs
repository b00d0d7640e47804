//! Process-wide logging setup.

/// Initialize tracing for the process, formatted per `RELIEF_LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

pub mod tracing;
