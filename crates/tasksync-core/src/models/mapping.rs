//! Local <-> remote id mappings

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Binds a local task id to its remote id within one list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskMapping {
    pub local_id: String,
    pub remote_id: String,
    pub list_id: String,
}

impl TaskMapping {
    pub fn new(
        local_id: impl Into<String>,
        remote_id: impl Into<String>,
        list_id: impl Into<String>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            remote_id: remote_id.into(),
            list_id: list_id.into(),
        }
    }
}

/// Outcome of [`MappingTable::bind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// A new mapping was recorded
    Created,
    /// The exact mapping already existed
    Unchanged,
}

/// Bijective mapping table indexed from both sides.
///
/// Insertion order is kept so the persisted file stays stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TaskMapping>", into = "Vec<TaskMapping>")]
pub struct MappingTable {
    entries: Vec<TaskMapping>,
    by_local: HashMap<String, usize>,
    by_remote: HashMap<String, usize>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping, refusing a second binding for either id.
    pub fn bind(&mut self, mapping: TaskMapping) -> Result<BindOutcome> {
        let local_slot = self.by_local.get(&mapping.local_id).copied();
        let remote_slot = self.by_remote.get(&mapping.remote_id).copied();

        match (local_slot, remote_slot) {
            (Some(a), Some(b)) if a == b => {
                let existing = &mut self.entries[a];
                if existing.list_id != mapping.list_id {
                    existing.list_id = mapping.list_id;
                }
                Ok(BindOutcome::Unchanged)
            }
            (Some(index), _) => Err(Error::MappingConflict(format!(
                "local task {} is already bound to remote task {}",
                mapping.local_id, self.entries[index].remote_id
            ))),
            (_, Some(index)) => Err(Error::MappingConflict(format!(
                "remote task {} is already bound to local task {}",
                mapping.remote_id, self.entries[index].local_id
            ))),
            (None, None) => {
                let index = self.entries.len();
                self.by_local.insert(mapping.local_id.clone(), index);
                self.by_remote.insert(mapping.remote_id.clone(), index);
                self.entries.push(mapping);
                Ok(BindOutcome::Created)
            }
        }
    }

    pub fn by_local(&self, local_id: &str) -> Option<&TaskMapping> {
        self.by_local.get(local_id).map(|&index| &self.entries[index])
    }

    pub fn by_remote(&self, remote_id: &str) -> Option<&TaskMapping> {
        self.by_remote
            .get(remote_id)
            .map(|&index| &self.entries[index])
    }

    pub fn remote_id_for(&self, local_id: &str) -> Option<&str> {
        self.by_local(local_id)
            .map(|mapping| mapping.remote_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskMapping> {
        self.entries.iter()
    }
}

impl From<Vec<TaskMapping>> for MappingTable {
    fn from(mappings: Vec<TaskMapping>) -> Self {
        let mut table = Self::new();
        for mapping in mappings {
            if let Err(error) = table.bind(mapping) {
                tracing::warn!("Ignoring persisted mapping: {error}");
            }
        }
        table
    }
}

impl From<MappingTable> for Vec<TaskMapping> {
    fn from(table: MappingTable) -> Self {
        table.entries
    }
}
