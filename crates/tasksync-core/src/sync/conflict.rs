//! Recency-based conflict resolution

use crate::models::TaskFields;

/// Side whose version of a task survives a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Whole-record last-writer-wins; equal timestamps go to the remote side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn resolve(local: &TaskFields, remote: &TaskFields) -> Winner {
        if local.modified_at > remote.modified_at {
            Winner::Local
        } else {
            Winner::Remote
        }
    }
}
