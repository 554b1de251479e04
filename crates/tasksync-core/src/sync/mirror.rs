//! Disposable in-memory snapshot of an account's remote tasks.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::dedup::signature;
use crate::models::{MappingTable, TaskFields, TaskRecord};
use crate::remote::{ListTasksQuery, RemoteResult, RemoteTask, RemoteTaskService, RetryPolicy};

/// A remote task staged for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRecord {
    pub remote_id: String,
    pub list_id: String,
    pub fields: TaskFields,
    pub hidden: bool,
}

impl MirrorRecord {
    pub fn is_live(&self) -> bool {
        self.fields.status.is_live()
    }
}

impl From<RemoteTask> for MirrorRecord {
    fn from(task: RemoteTask) -> Self {
        Self {
            remote_id: task.id,
            list_id: task.list_id,
            fields: task.fields,
            hidden: task.hidden,
        }
    }
}

/// A local record and the mirror record it corresponds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPair {
    pub local: TaskRecord,
    pub remote: MirrorRecord,
    /// `false` when the pair was matched by signature and still needs a mapping
    pub mapped: bool,
}

impl TaskPair {
    pub fn list_id(&self) -> &str {
        &self.remote.list_id
    }
}

/// Classification of every local and staged remote task
#[derive(Debug, Default)]
pub struct MirrorDiff {
    pub local_only: Vec<TaskRecord>,
    pub remote_only: Vec<MirrorRecord>,
    pub in_sync: Vec<TaskPair>,
    pub conflicting: Vec<TaskPair>,
    /// Mapped local records whose remote object no longer exists
    pub orphaned: Vec<TaskRecord>,
}

/// Staged remote state for one run.
///
/// The snapshot is cleared on [`MirrorStore::discard`] and on drop.
#[derive(Debug, Default)]
pub struct MirrorStore {
    lists: Vec<String>,
    records: Vec<MirrorRecord>,
    by_remote: HashMap<String, usize>,
    remote_calls: usize,
    list_task_calls: usize,
}

impl MirrorStore {
    /// Bulk-load every task of every list: one call for the lists, one per list.
    pub async fn load<R: RemoteTaskService>(
        remote: &R,
        account: &str,
        retry: &RetryPolicy,
    ) -> RemoteResult<Self> {
        let mut mirror = Self::default();

        let lists = retry
            .run("list task lists", || remote.list_task_lists(account))
            .await?;
        mirror.remote_calls += 1;

        for list_id in &lists {
            let tasks = retry
                .run("list tasks", || {
                    remote.list_tasks(list_id, ListTasksQuery::everything())
                })
                .await?;
            mirror.remote_calls += 1;
            mirror.list_task_calls += 1;
            mirror.stage_list(list_id, tasks);
        }
        mirror.lists = lists;

        debug!(
            "Staged {} remote tasks across {} lists for {account}",
            mirror.records.len(),
            mirror.lists.len()
        );
        Ok(mirror)
    }

    /// Replace the staged contents of one list with a fresh listing.
    pub fn stage_list(&mut self, list_id: &str, tasks: Vec<RemoteTask>) {
        self.records.retain(|record| record.list_id != list_id);
        self.records.extend(tasks.into_iter().map(MirrorRecord::from));
        if !self.lists.iter().any(|id| id == list_id) {
            self.lists.push(list_id.to_string());
        }
        self.reindex();
    }

    /// Stage a record the run itself just wrote.
    pub fn upsert(&mut self, record: MirrorRecord) {
        if let Some(&slot) = self.by_remote.get(&record.remote_id) {
            self.records[slot] = record;
        } else {
            self.by_remote
                .insert(record.remote_id.clone(), self.records.len());
            self.records.push(record);
        }
    }

    fn reindex(&mut self) {
        self.by_remote = self
            .records
            .iter()
            .enumerate()
            .map(|(slot, record)| (record.remote_id.clone(), slot))
            .collect();
    }

    /// List ids in the order the service reported them
    pub fn lists(&self) -> &[String] {
        &self.lists
    }

    pub fn get(&self, remote_id: &str) -> Option<&MirrorRecord> {
        self.by_remote.get(remote_id).map(|&slot| &self.records[slot])
    }

    pub fn records_in<'a>(&'a self, list_id: &'a str) -> impl Iterator<Item = &'a MirrorRecord> {
        self.records
            .iter()
            .filter(move |record| record.list_id == list_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remote calls made while loading
    pub const fn remote_calls(&self) -> usize {
        self.remote_calls
    }

    /// `list_tasks` calls made while loading, one per staged list
    pub const fn list_task_calls(&self) -> usize {
        self.list_task_calls
    }

    /// Classify local tasks against the staged snapshot. Makes no remote calls.
    ///
    /// Mapped pairs are joined through the mapping table. Unmapped live tasks
    /// on both sides are joined when their signatures match in the same list,
    /// first come first served.
    pub fn diff(&self, local_tasks: &[TaskRecord], mappings: &MappingTable) -> MirrorDiff {
        let mut diff = MirrorDiff::default();
        let mut unmapped_local = Vec::new();

        for local in local_tasks {
            match mappings.remote_id_for(&local.id) {
                Some(remote_id) => match self.get(remote_id) {
                    Some(remote) => diff.push_pair(local.clone(), remote.clone(), true),
                    None => diff.orphaned.push(local.clone()),
                },
                None => unmapped_local.push(local),
            }
        }

        let mut candidates: HashMap<(&str, _), VecDeque<&MirrorRecord>> = HashMap::new();
        let mut unmatched_remote = Vec::new();
        for remote in &self.records {
            if mappings.by_remote(&remote.remote_id).is_some() {
                continue;
            }
            if remote.is_live() {
                candidates
                    .entry((remote.list_id.as_str(), signature(&remote.fields)))
                    .or_default()
                    .push_back(remote);
            } else {
                unmatched_remote.push(remote);
            }
        }

        for local in unmapped_local {
            let matched = if local.is_live() {
                candidates
                    .get_mut(&(local.list_id.as_str(), signature(&local.fields)))
                    .and_then(VecDeque::pop_front)
            } else {
                None
            };
            match matched {
                Some(remote) => diff.push_pair(local.clone(), remote.clone(), false),
                None => diff.local_only.push(local.clone()),
            }
        }

        unmatched_remote.extend(candidates.into_values().flatten());
        let mut remote_only: Vec<MirrorRecord> = unmatched_remote.into_iter().cloned().collect();
        // keep service order so "first" duplicate is well defined
        remote_only.sort_by_key(|record| self.by_remote.get(&record.remote_id).copied());
        diff.remote_only = remote_only;

        diff
    }

    /// Drop the staged snapshot.
    pub fn discard(&mut self) {
        if !self.records.is_empty() {
            debug!("Discarding {} staged remote tasks", self.records.len());
        }
        self.records.clear();
        self.by_remote.clear();
        self.lists.clear();
    }
}

impl Drop for MirrorStore {
    fn drop(&mut self) {
        self.discard();
    }
}

impl MirrorDiff {
    fn push_pair(&mut self, local: TaskRecord, remote: MirrorRecord, mapped: bool) {
        let in_sync = local.fields.same_content(&remote.fields);
        let pair = TaskPair {
            local,
            remote,
            mapped,
        };
        if in_sync {
            self.in_sync.push(pair);
        } else {
            self.conflicting.push(pair);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TaskMapping, TaskStatus};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn remote(id: &str, list: &str, fields: TaskFields) -> RemoteTask {
        RemoteTask {
            id: id.to_string(),
            list_id: list.to_string(),
            fields,
            hidden: false,
        }
    }

    fn local(id: &str, list: &str, fields: TaskFields) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            remote_id: None,
            list_id: list.to_string(),
            fields,
        }
    }

    fn fields(title: &str) -> TaskFields {
        TaskFields::new(title).modified(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    }

    fn staged(tasks: Vec<RemoteTask>) -> MirrorStore {
        let mut mirror = MirrorStore::default();
        mirror.stage_list("inbox", tasks);
        mirror
    }

    fn ids<'a>(records: impl IntoIterator<Item = &'a TaskRecord>) -> Vec<&'a str> {
        records.into_iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn diff_classifies_mapped_pairs() {
        let mirror = staged(vec![
            remote("r1", "inbox", fields("Same")),
            remote("r2", "inbox", fields("Remote title")),
        ]);
        let mut mappings = MappingTable::new();
        mappings.bind(TaskMapping::new("l1", "r1", "inbox")).unwrap();
        mappings.bind(TaskMapping::new("l2", "r2", "inbox")).unwrap();
        mappings.bind(TaskMapping::new("l3", "r-gone", "inbox")).unwrap();

        let later = fields("Same").modified(Utc::now());
        let diff = mirror.diff(
            &[
                local("l1", "inbox", later),
                local("l2", "inbox", fields("Local title")),
                local("l3", "inbox", fields("Orphan")),
            ],
            &mappings,
        );

        assert_eq!(diff.in_sync.len(), 1);
        assert!(diff.in_sync[0].mapped);
        assert_eq!(diff.conflicting.len(), 1);
        assert_eq!(diff.conflicting[0].remote.remote_id, "r2");
        assert_eq!(ids(&diff.orphaned), vec!["l3"]);
        assert!(diff.local_only.is_empty());
        assert!(diff.remote_only.is_empty());
    }

    #[test]
    fn diff_joins_unmapped_duplicates_by_signature() {
        let mirror = staged(vec![
            remote("r1", "inbox", fields("Buy milk")),
            remote("r2", "inbox", fields("Buy milk")),
            remote("r3", "inbox", fields("Walk dog")),
        ]);

        let diff = mirror.diff(
            &[
                local("l1", "inbox", fields("  buy MILK ")),
                local("l2", "errands", fields("Walk dog")),
            ],
            &MappingTable::new(),
        );

        assert_eq!(diff.conflicting.len(), 1);
        let pair = &diff.conflicting[0];
        assert_eq!(pair.remote.remote_id, "r1");
        assert!(!pair.mapped);
        assert_eq!(ids(&diff.local_only), vec!["l2"]);
        let remote_only: Vec<_> = diff.remote_only.iter().map(|r| r.remote_id.as_str()).collect();
        assert_eq!(remote_only, vec!["r2", "r3"]);
    }

    #[test]
    fn deleted_records_never_join_by_signature() {
        let gone = fields("Buy milk").with_status(TaskStatus::Deleted);
        let mirror = staged(vec![remote("r1", "inbox", gone.clone())]);

        let diff = mirror.diff(&[local("l1", "inbox", gone)], &MappingTable::new());

        assert_eq!(ids(&diff.local_only), vec!["l1"]);
        assert_eq!(diff.remote_only.len(), 1);
        assert!(diff.in_sync.is_empty());
    }

    #[test]
    fn upsert_and_restage_keep_index_consistent() {
        let mut mirror = staged(vec![remote("r1", "inbox", fields("A"))]);
        mirror.upsert(MirrorRecord::from(remote("r2", "inbox", fields("B"))));
        assert_eq!(mirror.len(), 2);

        let edited = fields("A2").modified(Utc::now() + Duration::hours(1));
        mirror.upsert(MirrorRecord::from(remote("r1", "inbox", edited.clone())));
        assert_eq!(mirror.get("r1").unwrap().fields, edited);

        mirror.stage_list("inbox", vec![remote("r9", "inbox", fields("Z"))]);
        assert!(mirror.get("r1").is_none());
        assert_eq!(mirror.records_in("inbox").count(), 1);
    }

    #[test]
    fn discard_clears_snapshot() {
        let mut mirror = staged(vec![remote("r1", "inbox", fields("A"))]);
        mirror.discard();
        assert!(mirror.is_empty());
        assert!(mirror.lists().is_empty());
        assert!(mirror.get("r1").is_none());
    }
}
