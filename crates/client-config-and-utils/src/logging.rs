//! Logging initialization for the client.
//!
//! Thin wrapper over the observability crate. Every qrpass binary writes
//! structured JSONL to `~/.qrpass/logs/client.jsonl`.

use crate::Paths;

/// Initialize the logging system.
///
/// Sets up tracing with:
/// - Structured JSONL output to the log file under `paths` (or the default location)
/// - Log level from RUST_LOG or the provided default
/// - Compact stderr output when `verbose` is set
///
/// ```ignore
/// init_logging("info", Some(&paths), false);
/// tracing::info!("qrpass started");
/// ```
pub fn init_logging(level: &str, paths: Option<&Paths>, verbose: bool) {
    observability::init_with_config(observability::LogConfig {
        service_name: "qrpass".into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr: verbose,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
