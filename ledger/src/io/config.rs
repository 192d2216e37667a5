//! Ledger configuration stored as TOML (conventionally `ledger.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::store::FileStore;

/// Ledger configuration (TOML).
///
/// Missing fields fall back to defaults so a partial file stays valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding `runs/<run_id>.json`.
    pub storage_root: PathBuf,

    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Flush record files and their directory before a save returns.
    pub fsync: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { fsync: true }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(".ledger"),
            storage: StorageConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(anyhow!("storage_root must not be empty"));
        }
        Ok(())
    }

    /// File store described by this config.
    pub fn file_store(&self) -> FileStore {
        FileStore::new(&self.storage_root).with_fsync(self.storage.fsync)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LedgerConfig::default()`.
pub fn load_config(path: &Path) -> Result<LedgerConfig> {
    if !path.exists() {
        let cfg = LedgerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LedgerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
