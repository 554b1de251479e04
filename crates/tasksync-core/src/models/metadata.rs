//! Persisted per-account sync metadata

use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mapping::MappingTable;

/// Authentication-failure state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthState {
    /// Operations permitted
    #[default]
    Normal,
    /// The most recent remote call failed authentication
    AuthFailed,
    /// Repeated failures; creates are refused
    Blocked,
}

impl AuthState {
    /// Transition after an authentication-class failure.
    #[must_use]
    pub const fn on_auth_failure(self) -> Self {
        match self {
            Self::Normal => Self::AuthFailed,
            Self::AuthFailed | Self::Blocked => Self::Blocked,
        }
    }

    /// Transition after a successful authenticated call.
    #[must_use]
    pub const fn on_success(self) -> Self {
        Self::Normal
    }

    pub const fn allows_create(self) -> bool {
        !matches!(self, Self::Blocked)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::AuthFailed => "AUTH_FAILED",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which orchestrator operation produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Push,
    Pull,
    Sync,
}

impl SyncOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-outcome task counts for one phase or run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncCounts {
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }
}

impl AddAssign for SyncCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

/// One append-only sync log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: SyncOperation,
    #[serde(flatten)]
    pub counts: SyncCounts,
}

/// Durable cross-run state for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub account: String,
    #[serde(default)]
    pub last_push_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_pull_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auth_state: AuthState,
    #[serde(default)]
    pub mappings: MappingTable,
    #[serde(default)]
    pub sync_log: Vec<SyncLogEntry>,
}

impl SyncMetadata {
    /// Metadata for an account that has never synced
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            last_push_at: None,
            last_pull_at: None,
            last_sync_at: None,
            auth_state: AuthState::Normal,
            mappings: MappingTable::new(),
            sync_log: Vec::new(),
        }
    }

    /// Stamp the completion of a run and append its log entry.
    pub fn record_run(&mut self, operation: SyncOperation, counts: SyncCounts, at: DateTime<Utc>) {
        match operation {
            SyncOperation::Push => self.last_push_at = Some(at),
            SyncOperation::Pull => self.last_pull_at = Some(at),
            SyncOperation::Sync => {
                self.last_pull_at = Some(at);
                self.last_push_at = Some(at);
                self.last_sync_at = Some(at);
            }
        }
        self.sync_log.push(SyncLogEntry {
            timestamp: at,
            operation,
            counts,
        });
    }

    /// Most recent log entries, newest first.
    pub fn recent_log(&self, limit: usize) -> impl Iterator<Item = &SyncLogEntry> {
        self.sync_log.iter().rev().take(limit)
    }
}
