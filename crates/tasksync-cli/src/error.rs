use tasksync_core::models::{AuthState, SyncOperation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tasksync_core::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "{operation} for account '{account}' stopped: authentication failed (auth state {state}). Refresh the access token and retry."
    )]
    AuthAborted {
        operation: SyncOperation,
        account: String,
        state: AuthState,
    },
}
