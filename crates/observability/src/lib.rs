//! Tracing/logging setup shared by every tessera binary.

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize process-wide tracing, format chosen by `LOG_FORMAT` (JSON unless `pretty`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());
    tracing::init(format);
}
