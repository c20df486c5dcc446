//! Tracing and logging setup shared by binaries and tests.

/// Initialize process-wide tracing with the format chosen by
/// `WARDROBE_LOG_FORMAT` (`json` by default, or `pretty`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use crate::tracing::{LogFormat, ParseLogFormatError};
