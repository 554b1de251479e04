//! Error types for tasksync-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using tasksync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tasksync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote task service error
    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),

    /// Task not found
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A second mapping was requested for an already-bound id
    #[error("Mapping conflict: {0}")]
    MappingConflict(String),

    /// Another run for the same account has not finished yet
    #[error("A sync run for account '{0}' is already in progress")]
    SyncInProgress(String),
}
