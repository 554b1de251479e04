//! Data models for tasksync

mod mapping;
mod metadata;
mod task;

pub use mapping::{BindOutcome, MappingTable, TaskMapping};
pub use metadata::{AuthState, SyncCounts, SyncLogEntry, SyncMetadata, SyncOperation};
pub use task::{TaskFields, TaskId, TaskRecord, TaskStatus};
