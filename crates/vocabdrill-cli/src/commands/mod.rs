pub mod init;
pub mod ledger;
pub mod list_models;
pub mod play;
pub mod progress;
pub mod story;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use vocabdrill_core::catalog::load_catalog;
use vocabdrill_core::ledger::Ledger;
use vocabdrill_core::model::Catalog;
use vocabdrill_core::store::{current_user, set_current_user, FileStore, StorageKeys};
use vocabdrill_providers::{load_config_from, VocabdrillConfig};

/// Catalog used when neither `--catalog` nor the config names one.
pub const DEFAULT_CATALOG_PATH: &str = "catalogs/starter.json";

/// Ledger namespace used when no catalog can be found.
const DEFAULT_CATALOG_ID: &str = "en-zh";

/// Options shared by every subcommand.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn load_config(&self) -> Result<VocabdrillConfig> {
        load_config_from(self.config.as_deref())
    }

    pub fn open_store(&self, config: &VocabdrillConfig) -> FileStore {
        let root = self
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data_dir.clone());
        tracing::debug!("using data directory {}", root.display());
        FileStore::new(root)
    }
}

/// Pick the learner: an explicit name becomes the remembered one, otherwise
/// the remembered one is used.
pub fn resolve_user(store: &FileStore, keys: &StorageKeys, user: Option<String>) -> Result<String> {
    match user.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        Some(user) => {
            set_current_user(store, keys, &user).context("failed to remember the current user")?;
            Ok(user)
        }
        None => current_user(store, keys)
            .context("no learner selected; pass --user <name> once to choose one"),
    }
}

pub fn catalog_path(config: &VocabdrillConfig, catalog: Option<PathBuf>) -> PathBuf {
    catalog
        .or_else(|| config.catalog.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_PATH))
}

pub fn open_catalog(path: &Path) -> Result<Catalog> {
    load_catalog(path).with_context(|| {
        format!(
            "cannot open catalog {} (run `vocabdrill init` for a starter catalog)",
            path.display()
        )
    })
}

/// The ledger namespace for a catalog.
///
/// An explicit catalog must load; the configured or default one may be
/// missing, in which case the default namespace is used.
pub fn catalog_id(config: &VocabdrillConfig, catalog: Option<PathBuf>) -> Result<String> {
    let explicit = catalog.is_some();
    let path = catalog_path(config, catalog);
    if explicit || path.exists() {
        return Ok(open_catalog(&path)?.meta.id);
    }
    tracing::debug!(
        "catalog {} not found, using ledger namespace '{DEFAULT_CATALOG_ID}'",
        path.display()
    );
    Ok(DEFAULT_CATALOG_ID.to_string())
}

pub fn open_ledger(store: FileStore, config: &VocabdrillConfig, catalog_id: &str) -> Ledger<FileStore> {
    Ledger::new(store, catalog_id).with_policy(config.ledger)
}
