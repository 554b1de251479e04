//! tasksync-core - Task list synchronization engine
//!
//! Reconciles a locally stored task collection with a remote task-list
//! service: push, pull and bidirectional sync with recency-based conflict
//! resolution, duplicate prevention and an authentication back-off state
//! machine. Used by the `tasksync` CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{TaskFields, TaskId, TaskRecord, TaskStatus};
pub use sync::{MetadataStore, SyncOrchestrator, SyncReport};
