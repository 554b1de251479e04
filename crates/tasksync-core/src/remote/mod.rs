//! Remote task-list service boundary.
//!
//! The sync engine talks to the remote side only through [`RemoteTaskService`].
//! [`HttpTaskService`] implements it against the Google Tasks v1 REST shape;
//! tests substitute an in-process fake.

mod http;
mod retry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TaskFields;

pub use http::{HttpTaskService, DEFAULT_API_BASE_URL};
pub use retry::RetryPolicy;

/// Failure classes a remote call can report
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport failure, timeout, rate limit or server error; retryable
    #[error("Network error: {0}")]
    Network(String),
    /// Credentials rejected; never retried within a run
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// The service rejected the request payload
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl RemoteError {
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Which items a list call should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ListTasksQuery {
    pub include_completed: bool,
    pub include_hidden: bool,
    pub include_deleted: bool,
}

impl ListTasksQuery {
    /// Everything the service holds, so duplicates cannot hide from the diff
    pub const fn everything() -> Self {
        Self {
            include_completed: true,
            include_hidden: true,
            include_deleted: true,
        }
    }
}

/// A task as reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub list_id: String,
    #[serde(flatten)]
    pub fields: TaskFields,
    /// Completed and cleared from the default view
    #[serde(default)]
    pub hidden: bool,
}

/// Trait for remote task-list operations (async)
///
/// Every call is a suspension point and may fail with any [`RemoteError`] class.
#[allow(async_fn_in_trait)]
pub trait RemoteTaskService {
    /// Ids of every task list the account can see
    async fn list_task_lists(&self, account: &str) -> RemoteResult<Vec<String>>;

    /// All tasks of one list matching the query
    async fn list_tasks(&self, list_id: &str, query: ListTasksQuery)
        -> RemoteResult<Vec<RemoteTask>>;

    /// Create a task and return the id the service assigned
    async fn create_task(&self, list_id: &str, fields: &TaskFields) -> RemoteResult<String>;

    /// Overwrite a task's fields
    async fn update_task(
        &self,
        list_id: &str,
        remote_id: &str,
        fields: &TaskFields,
    ) -> RemoteResult<()>;

    /// Delete a task; the service keeps it visible to `include_deleted` queries
    async fn delete_task(&self, list_id: &str, remote_id: &str) -> RemoteResult<()>;
}
