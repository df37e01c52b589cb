//! Credential storage for the qrpass client.
//!
//! Backends:
//! - **File**: a 0600 JSON file under `~/.qrpass`
//! - **Memory**: process-local, for tests and throwaway sessions
//!
//! [`RefreshCredentials`] layers the refresh-token persistence policy on top.

mod file;
mod keys;
mod memory;
mod refresh;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use refresh::RefreshCredentials;
pub use traits::CredentialStorage;

use client_config_and_utils::{Paths, RefreshTokenPersistence};
use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default storage backend.
pub fn create_storage(paths: &Paths) -> Arc<dyn CredentialStorage> {
    Arc::new(FileStorage::new(paths.credentials_file()))
}

/// Create refresh credentials for `policy` backed by the default storage.
pub fn create_refresh_credentials(
    paths: &Paths,
    policy: RefreshTokenPersistence,
) -> RefreshCredentials {
    RefreshCredentials::new(policy, create_storage(paths))
}
