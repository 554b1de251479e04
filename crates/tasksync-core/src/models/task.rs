//! Task model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A unique identifier for a locally stored task, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Still to do
    #[default]
    Pending,
    /// Done
    Completed,
    /// Soft deleted; kept so the deletion can be synced
    Deleted,
}

impl TaskStatus {
    /// Stable lowercase name, also used as the stored column value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        }
    }

    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "deleted" => Ok(Self::Deleted),
            other => Err(Error::InvalidInput(format!("Unknown task status: {other}"))),
        }
    }
}

/// The synchronized payload of a task, shared by both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    /// Short title
    pub title: String,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
    /// Optional due date
    #[serde(default)]
    pub due: Option<NaiveDate>,
    /// Lifecycle state
    pub status: TaskStatus,
    /// Last modification time; compared for recency
    pub modified_at: DateTime<Utc>,
}

impl TaskFields {
    /// Create a pending task payload stamped with the current time
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            notes: String::new(),
            due: None,
            status: TaskStatus::Pending,
            modified_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub const fn with_due(mut self, due: NaiveDate) -> Self {
        self.due = Some(due);
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub const fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }

    /// Compare the user-visible content, ignoring `modified_at`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.title == other.title
            && self.notes == other.notes
            && self.due == other.due
            && self.status == other.status
    }

    /// Reject payloads that neither side can store.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() && self.notes.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Task must have a title or notes".to_string(),
            ));
        }
        Ok(())
    }
}

/// A task as held by one side of the sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Local identifier
    pub id: String,
    /// Remote identifier, once the task exists remotely
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Task list the record belongs to
    pub list_id: String,
    /// Synchronized payload
    #[serde(flatten)]
    pub fields: TaskFields,
}

impl TaskRecord {
    pub fn is_live(&self) -> bool {
        self.fields.status.is_live()
    }
}
