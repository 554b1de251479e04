//! Content signatures and duplicate lookup.

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};

use crate::models::TaskFields;
use crate::util::collapse_whitespace;

const FIELD_SEPARATOR: &str = "\u{1f}";

/// Hex-encoded SHA-256 over a task's normalized content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the content signature of a task.
///
/// Title is trimmed, whitespace-collapsed and lowercased; notes are trimmed
/// and whitespace-collapsed; due is an ISO date or empty. `modified_at` never
/// contributes, so the same content edited at different times still matches.
pub fn signature(fields: &TaskFields) -> Signature {
    let title = collapse_whitespace(&fields.title).to_lowercase();
    let notes = collapse_whitespace(&fields.notes);
    let due = fields
        .due
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let normalized = [
        title.as_str(),
        notes.as_str(),
        due.as_str(),
        fields.status.as_str(),
    ]
    .join(FIELD_SEPARATOR);

    Signature(hex::encode(Sha256::digest(normalized.as_bytes())))
}

/// Signature index over live tasks, scoped per list.
///
/// Each `(list, signature)` slot remembers the first id inserted for it.
#[derive(Debug, Default)]
pub struct Deduplicator {
    index: HashMap<(String, Signature), String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a task; deleted tasks are ignored.
    ///
    /// Returns `false` when the slot was already taken.
    pub fn insert(&mut self, list_id: &str, id: &str, fields: &TaskFields) -> bool {
        if !fields.status.is_live() {
            return false;
        }
        let key = (list_id.to_string(), signature(fields));
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, id.to_string());
        true
    }

    /// Id of a live task in the same list whose signature matches the candidate
    pub fn find_duplicate(&self, list_id: &str, candidate: &TaskFields) -> Option<&str> {
        self.index
            .get(&(list_id.to_string(), signature(candidate)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str, &'a TaskFields)> for Deduplicator {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str, &'a TaskFields)>>(iter: I) -> Self {
        let mut dedup = Self::new();
        for (list_id, id, fields) in iter {
            dedup.insert(list_id, id, fields);
        }
        dedup
    }
}
