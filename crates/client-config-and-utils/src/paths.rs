//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the home directory.
const BASE_DIR_NAME: &str = ".qrpass";

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client files (~/.qrpass)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.qrpass`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.qrpass).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.qrpass/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Client-readable credential store (~/.qrpass/credentials.json).
    ///
    /// Only used when refresh tokens are persisted locally.
    pub fn credentials_file(&self) -> PathBuf {
        self.base_dir.join("credentials.json")
    }

    /// Get the logs directory (~/.qrpass/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.qrpass/logs/client.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("client.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-qrpass");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.credentials_file(), base.join("credentials.json"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
        assert_eq!(paths.log_file(), base.join("logs/client.jsonl"));
    }

    #[test]
    fn test_paths_default() {
        let paths = Paths::new().unwrap();
        let home = dirs::home_dir().unwrap();

        assert_eq!(paths.base_dir(), &home.join(".qrpass"));
    }

    #[test]
    fn test_ensure_dirs_creates_directories() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("qrpass");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(base.is_dir());
        assert!(paths.logs_dir().is_dir());
    }
}
