//! Configuration, paths, errors and logging setup shared by the qrpass crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, RefreshTokenPersistence, ScanSettings, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
