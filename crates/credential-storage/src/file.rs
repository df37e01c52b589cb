//! JSON file storage backend.
//!
//! All keys live in a single flat JSON object. Every write rewrites the file
//! through a temporary sibling and a rename.

use crate::{CredentialStorage, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Client-readable credential file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Encoding(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            serde_json::to_string_pretty(map).map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> StorageResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> StorageResult<()> {
    Ok(())
}

impl CredentialStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_map(&map)?;
        }
        Ok(existed)
    }
}
