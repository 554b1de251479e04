//! File-backed persistence for per-account sync metadata.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::SyncMetadata;

/// Stores one `<account>.json` document per account in a directory
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, account: &str) -> Result<PathBuf> {
        validate_account(account)?;
        Ok(self.dir.join(format!("{account}.json")))
    }

    /// Load an account's metadata; an absent file means the account never synced.
    pub fn load(&self, account: &str) -> Result<SyncMetadata> {
        let path = self.path_for(account)?;
        if !path.exists() {
            return Ok(SyncMetadata::new(account));
        }

        let raw = std::fs::read_to_string(&path)?;
        let metadata: SyncMetadata = serde_json::from_str(&raw)?;
        if metadata.account != account {
            return Err(Error::InvalidInput(format!(
                "Metadata at {} belongs to account '{}'",
                path.display(),
                metadata.account
            )));
        }
        Ok(metadata)
    }

    /// Persist metadata through a temp file and rename, so readers never see a partial write.
    pub fn save(&self, metadata: &SyncMetadata) -> Result<()> {
        let path = self.path_for(&metadata.account)?;
        std::fs::create_dir_all(&self.dir)?;

        let mut serialized = serde_json::to_string_pretty(metadata)?;
        serialized.push('\n');

        let temp_path = self.dir.join(format!(".{}.json.tmp", metadata.account));
        std::fs::write(&temp_path, serialized)?;
        std::fs::rename(&temp_path, &path)?;

        debug!(
            "Saved sync metadata for {} ({} mappings)",
            metadata.account,
            metadata.mappings.len()
        );
        Ok(())
    }
}

fn validate_account(account: &str) -> Result<()> {
    if account.trim().is_empty() {
        return Err(Error::InvalidInput("Account must not be empty".to_string()));
    }
    if account != account.trim() {
        return Err(Error::InvalidInput(format!(
            "Account '{account}' must not have surrounding whitespace"
        )));
    }
    if account.starts_with('.') || account.contains(['/', '\\']) || account.contains('\0') {
        return Err(Error::InvalidInput(format!(
            "Account '{account}' is not a valid file name"
        )));
    }
    Ok(())
}
