//! Tracing/logging setup shared by purchase sessions.

/// Initialize process-wide observability (JSON tracing output).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}

/// Initialize using `IAP_LOG_FORMAT` (`json` or `pretty`), defaulting to JSON.
pub fn init_from_env() {
    let format = std::env::var("IAP_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default();
    tracing::init(format);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::LogFormat;
