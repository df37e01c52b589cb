//! Refresh credential policy.

use crate::{CredentialStorage, StorageKeys, StorageResult};
use client_config_and_utils::RefreshTokenPersistence;
use std::sync::Arc;

/// Where the refresh token lives, and how to reach it.
///
/// Under [`RefreshTokenPersistence::Cookie`] the token is owned by the HTTP
/// cookie jar: `load` always yields `None` and `store`/`clear` touch nothing.
#[derive(Clone)]
pub struct RefreshCredentials {
    policy: RefreshTokenPersistence,
    storage: Arc<dyn CredentialStorage>,
}

impl RefreshCredentials {
    pub fn new(policy: RefreshTokenPersistence, storage: Arc<dyn CredentialStorage>) -> Self {
        Self { policy, storage }
    }

    /// Cookie policy with a throwaway backend.
    pub fn cookie() -> Self {
        Self::new(
            RefreshTokenPersistence::Cookie,
            Arc::new(crate::MemoryStorage::new()),
        )
    }

    pub fn policy(&self) -> RefreshTokenPersistence {
        self.policy
    }

    /// Whether refresh requests must carry the token in their body.
    pub fn is_explicit(&self) -> bool {
        self.policy == RefreshTokenPersistence::LocalStorage
    }

    pub fn load(&self) -> StorageResult<Option<String>> {
        match self.policy {
            RefreshTokenPersistence::Cookie => Ok(None),
            RefreshTokenPersistence::LocalStorage => {
                self.storage.get(StorageKeys::REFRESH_TOKEN)
            }
        }
    }

    pub fn store(&self, token: &str) -> StorageResult<()> {
        match self.policy {
            RefreshTokenPersistence::Cookie => Ok(()),
            RefreshTokenPersistence::LocalStorage => {
                tracing::debug!("Persisting refresh token");
                self.storage.set(StorageKeys::REFRESH_TOKEN, token)
            }
        }
    }

    pub fn clear(&self) -> StorageResult<()> {
        match self.policy {
            RefreshTokenPersistence::Cookie => Ok(()),
            RefreshTokenPersistence::LocalStorage => {
                self.storage.delete(StorageKeys::REFRESH_TOKEN).map(|_| ())
            }
        }
    }
}

impl std::fmt::Debug for RefreshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCredentials")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
