//! # Observability
//!
//! Centralized logging layer for the qrpass workspace.
//!
//! Crates are **log producers**: they use the standard `tracing` macros and
//! never decide where logs go. The binary calls [`init_with_config`] once at
//! startup, which installs:
//!
//! - a JSONL file layer writing to `~/.qrpass/logs/client.jsonl`
//! - an optional compact stderr layer for interactive use
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "qrpass".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file_writer;
mod json_layer;

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_writer::{FileLogWriter, WriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every log line.
    pub service_name: String,

    /// Default level filter. `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.qrpass/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default JSONL log location.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".qrpass")
        .join("logs")
        .join("client.jsonl")
}

/// Initialize the logging layer with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the logging layer with custom configuration.
///
/// If the log file cannot be opened, logging falls back to stderr only.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_with_config(config: LogConfig) {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let env_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let json_layer = match FileLogWriter::new(&log_path) {
        Ok(writer) => Some(
            JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                .with_filter(env_filter()),
        ),
        Err(e) => {
            eprintln!("failed to open log file {}: {}", log_path.display(), e);
            None
        }
    };
    let file_enabled = json_layer.is_some();

    let stderr_layer = (config.also_stderr || !file_enabled).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(env_filter())
    });

    if tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    tracing::debug!(
        service = %config.service_name,
        log_path = %log_path.display(),
        file_enabled,
        "observability initialized"
    );
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
