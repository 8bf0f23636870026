//! Key-value persistence for per-user documents.
//!
//! Every persisted thing (current user, ledger, settings, progress) is one
//! JSON document under one key. Writes replace the whole document, so two
//! sessions writing the same key race and the later write wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

/// Storage backend holding whole documents under string keys.
pub trait KeyValueStore: Send + Sync {
    /// Read a document, `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace a document.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a document. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Key scheme shared by every backend.
///
/// Keys are a fixed prefix plus the username; ledger keys also carry the
/// catalog id so switching catalogs yields an independent ledger.
#[derive(Debug, Clone)]
pub struct StorageKeys {
    pub current_user: String,
    pub ledger_prefix: String,
    pub settings_prefix: String,
    pub progress_prefix: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            current_user: "vocab_currentUser".into(),
            ledger_prefix: "vocab_wrongWords_".into(),
            settings_prefix: "vocab_settings_".into(),
            progress_prefix: "vocab_progress_".into(),
        }
    }
}

impl StorageKeys {
    pub fn ledger(&self, user: &str, catalog_id: &str) -> String {
        format!("{}{user}_{catalog_id}", self.ledger_prefix)
    }

    pub fn settings(&self, user: &str) -> String {
        format!("{}{user}", self.settings_prefix)
    }

    pub fn progress(&self, user: &str) -> String {
        format!("{}{user}", self.progress_prefix)
    }
}

/// Read the current-user pointer, empty strings count as absent.
pub fn current_user(store: &dyn KeyValueStore, keys: &StorageKeys) -> Option<String> {
    match store.get(&keys.current_user) {
        Ok(value) => value.filter(|u| !u.trim().is_empty()),
        Err(e) => {
            tracing::warn!("failed to read current user: {e}");
            None
        }
    }
}

pub fn set_current_user(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
    user: &str,
) -> Result<(), StoreError> {
    store.set(&keys.current_user, user)
}

/// One file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical key to a file path, escaping anything not file-safe.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for c in key.chars() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                name.push(c);
            } else {
                name.push_str(&format!("%{:04X}", c as u32));
            }
        }
        self.root.join(format!("{name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}
