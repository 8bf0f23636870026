//! Persisted per-user progress.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{KeyValueStore, StorageKeys};

/// Where a user left off: written at session end, read at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub total_answered: u64,
    #[serde(default)]
    pub total_correct: u64,
}

impl UserProgress {
    /// Correct answers as a fraction of answered, 0.0 when nothing was answered.
    pub fn accuracy(&self) -> f64 {
        if self.total_answered == 0 {
            0.0
        } else {
            self.total_correct as f64 / self.total_answered as f64
        }
    }
}

/// Load a user's progress; absent or corrupt documents yield the default.
pub fn load_progress(store: &dyn KeyValueStore, keys: &StorageKeys, user: &str) -> UserProgress {
    let key = keys.progress(user);
    match store.get(&key) {
        Ok(Some(doc)) => serde_json::from_str(&doc).unwrap_or_else(|e| {
            tracing::warn!("progress document for '{user}' is corrupt, using defaults: {e}");
            UserProgress::default()
        }),
        Ok(None) => UserProgress::default(),
        Err(e) => {
            tracing::warn!("failed to read progress for '{user}': {e}");
            UserProgress::default()
        }
    }
}

pub fn save_progress(
    store: &dyn KeyValueStore,
    keys: &StorageKeys,
    user: &str,
    progress: &UserProgress,
) -> Result<(), StoreError> {
    let doc = serde_json::to_string(progress)?;
    store.set(&keys.progress(user), &doc)
}
