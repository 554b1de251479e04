use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tasksync_core::config::SyncSettings;

use crate::error::CliError;

const APP_DIR: &str = "tasksync";

/// Filesystem locations a command works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliPaths {
    pub db: PathBuf,
    pub metadata_dir: PathBuf,
    pub config: PathBuf,
}

impl CliPaths {
    /// Flag, then environment variable, then the platform default.
    pub fn resolve(
        db: Option<PathBuf>,
        metadata_dir: Option<PathBuf>,
        config: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let data_dir = || {
            dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
        };

        let db = match db.or_else(|| env::var_os("TASKSYNC_DB_PATH").map(PathBuf::from)) {
            Some(path) => path,
            None => data_dir()?.join("tasks.db"),
        };
        let metadata_dir = match metadata_dir
            .or_else(|| env::var_os("TASKSYNC_METADATA_DIR").map(PathBuf::from))
        {
            Some(path) => path,
            None => data_dir()?.join("metadata"),
        };
        let config = match config.or_else(|| env::var_os("TASKSYNC_CONFIG").map(PathBuf::from)) {
            Some(path) => path,
            None => dirs::config_dir()
                .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))?
                .join(APP_DIR)
                .join("config.json"),
        };

        Ok(Self {
            db,
            metadata_dir,
            config,
        })
    }
}

pub fn load_settings(path: &Path) -> Result<SyncSettings, CliError> {
    SyncSettings::load_from_path(path).map_err(|error| {
        CliError::Config(format!(
            "Failed to load settings at {}: {error}",
            path.display()
        ))
    })
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "never".to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
