/*
 * Durable key-value storage that survives restarts, the client's equivalent of
 * browser local storage. The session core uses exactly one key, `authToken`,
 * holding the opaque session token; absence of the key means "no session".
 *
 * Access goes through the `SessionStorageOperations` trait so the state
 * container and the hydration task can be exercised against in-memory fakes.
 * `CoreSessionStorage` keeps all keys in a single JSON object file inside the
 * per-user local configuration directory.
 */
use crate::core::path_utils;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const AUTH_TOKEN_KEY: &str = "authToken";
const LOCAL_STORAGE_FILENAME: &str = "local_storage.json";

#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    Serialization(serde_json::Error),
    // No durable location exists (e.g. storage disabled or no home directory).
    Unavailable,
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "Storage I/O error: {e}"),
            StorageError::Serialization(e) => write!(f, "Storage file is malformed: {e}"),
            StorageError::Unavailable => write!(f, "Durable storage is unavailable"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(e) => Some(e),
            StorageError::Unavailable => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub trait SessionStorageOperations: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    // Removing a key that is not present succeeds.
    fn remove_item(&self, key: &str) -> Result<()>;
}

pub struct CoreSessionStorage {
    file_path: Option<PathBuf>,
    // Serializes read-modify-write cycles on the backing file.
    file_lock: Mutex<()>,
}

impl CoreSessionStorage {
    /*
     * Creates storage backed by `local_storage.json` in the application's local
     * configuration directory. If that directory cannot be determined the storage
     * is created in an unavailable state: reads and writes fail with
     * `StorageError::Unavailable`, which callers treat as "no session".
     */
    pub fn for_app(app_name: &str) -> Self {
        let file_path = path_utils::get_base_app_config_local_dir(app_name)
            .map(|dir| dir.join(LOCAL_STORAGE_FILENAME));
        if file_path.is_none() {
            log::warn!("CoreSessionStorage: No local config dir for '{app_name}'; storage disabled.");
        }
        CoreSessionStorage {
            file_path,
            file_lock: Mutex::new(()),
        }
    }

    pub fn with_file(file_path: &Path) -> Self {
        CoreSessionStorage {
            file_path: Some(file_path.to_path_buf()),
            file_lock: Mutex::new(()),
        }
    }

    fn backing_file(&self) -> Result<&Path> {
        self.file_path.as_deref().ok_or(StorageError::Unavailable)
    }

    fn read_all(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(path: &Path, items: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn modify<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let path = self.backing_file()?;
        let _guard = self
            .file_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = Self::read_all(path)?;
        if mutate(&mut items) {
            Self::write_all(path, &items)?;
        }
        Ok(())
    }
}

impl SessionStorageOperations for CoreSessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.backing_file()?;
        let _guard = self
            .file_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut items = Self::read_all(path)?;
        log::trace!("CoreSessionStorage: get_item '{key}' from {path:?}");
        Ok(items.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        log::debug!("CoreSessionStorage: set_item '{key}'");
        self.modify(|items| {
            items.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        log::debug!("CoreSessionStorage: remove_item '{key}'");
        self.modify(|items| items.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove_item() {
        // Arrange
        let dir = tempdir().unwrap();
        let storage = CoreSessionStorage::with_file(&dir.path().join(LOCAL_STORAGE_FILENAME));

        // Act & Assert
        assert_eq!(storage.get_item(AUTH_TOKEN_KEY).unwrap(), None);
        storage.set_item(AUTH_TOKEN_KEY, "abc123").unwrap();
        assert_eq!(
            storage.get_item(AUTH_TOKEN_KEY).unwrap(),
            Some("abc123".to_string())
        );
        storage.remove_item(AUTH_TOKEN_KEY).unwrap();
        assert_eq!(storage.get_item(AUTH_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let storage = CoreSessionStorage::with_file(&dir.path().join(LOCAL_STORAGE_FILENAME));

        assert!(storage.remove_item(AUTH_TOKEN_KEY).is_ok());
        assert!(storage.remove_item(AUTH_TOKEN_KEY).is_ok());
    }

    #[test]
    fn test_other_keys_survive_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCAL_STORAGE_FILENAME);
        let storage = CoreSessionStorage::with_file(&path);

        storage.set_item("theme", "dark").unwrap();
        storage.set_item(AUTH_TOKEN_KEY, "abc123").unwrap();
        storage.remove_item(AUTH_TOKEN_KEY).unwrap();

        assert_eq!(storage.get_item("theme").unwrap(), Some("dark".to_string()));
        // A second instance on the same file sees the persisted data.
        let reopened = CoreSessionStorage::with_file(&path);
        assert_eq!(reopened.get_item("theme").unwrap(), Some("dark".to_string()));
    }

    #[test]
    fn test_malformed_file_reports_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCAL_STORAGE_FILENAME);
        fs::write(&path, "{ not json").unwrap();
        let storage = CoreSessionStorage::with_file(&path);

        match storage.get_item(AUTH_TOKEN_KEY) {
            Err(StorageError::Serialization(_)) => {}
            other => panic!("Expected serialization error, got {other:?}"),
        }
    }

    #[test]
    fn test_unavailable_storage_fails_every_operation() {
        let storage = CoreSessionStorage {
            file_path: None,
            file_lock: Mutex::new(()),
        };

        assert!(matches!(
            storage.get_item(AUTH_TOKEN_KEY),
            Err(StorageError::Unavailable)
        ));
        assert!(matches!(
            storage.set_item(AUTH_TOKEN_KEY, "x"),
            Err(StorageError::Unavailable)
        ));
    }
}
