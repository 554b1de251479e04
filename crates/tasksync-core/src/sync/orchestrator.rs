//! Push, pull and bidirectional sync runs for one account.

use std::cell::Cell;
use std::collections::HashMap;
use std::ops::ControlFlow;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::conflict::{ConflictResolver, Winner};
use super::dedup::{signature, Deduplicator, Signature};
use super::flight::InFlightAccounts;
use super::metadata_store::MetadataStore;
use super::mirror::{MirrorDiff, MirrorRecord, MirrorStore, TaskPair};
use crate::db::LocalTaskStore;
use crate::error::Result;
use crate::models::{
    AuthState, MappingTable, SyncCounts, SyncMetadata, SyncOperation, TaskFields, TaskMapping,
    TaskRecord,
};
use crate::remote::{ListTasksQuery, RemoteError, RemoteResult, RemoteTaskService, RetryPolicy};

/// `Break` carries the authentication failure that ended the run
type Flow = ControlFlow<RemoteError>;

/// Outcome of one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub account: String,
    pub operation: SyncOperation,
    /// Local changes made from remote state
    pub pulled: SyncCounts,
    /// Remote changes made from local state
    pub pushed: SyncCounts,
    /// The run stopped early on an authentication failure
    pub auth_aborted: bool,
    /// Auth state persisted when the run finished
    pub auth_state: AuthState,
    /// Per-list task fetches spent staging the mirror, one per list
    pub remote_list_calls: usize,
}

impl SyncReport {
    fn new(account: &str, operation: SyncOperation, auth_state: AuthState) -> Self {
        Self {
            account: account.to_string(),
            operation,
            pulled: SyncCounts::default(),
            pushed: SyncCounts::default(),
            auth_aborted: false,
            auth_state,
            remote_list_calls: 0,
        }
    }

    /// Counts of both phases combined
    pub fn counts(&self) -> SyncCounts {
        let mut total = self.pulled;
        total += self.pushed;
        total
    }

    pub fn summary(&self) -> String {
        let counts = self.counts();
        let mut line = format!(
            "{} {}: {} created, {} updated, {} skipped, {} failed",
            self.operation,
            self.account,
            counts.created,
            counts.updated,
            counts.skipped,
            counts.failed
        );
        if self.operation == SyncOperation::Sync {
            line.push_str(&format!(
                " (pulled {}, pushed {})",
                self.pulled.total(),
                self.pushed.total()
            ));
        }
        if self.auth_aborted {
            line.push_str(&format!(
                "; aborted on authentication failure, auth state {}",
                self.auth_state
            ));
        }
        line
    }
}

/// Drives push, pull and sync runs between a local store and a remote service
pub struct SyncOrchestrator<R, L> {
    remote: R,
    local: L,
    metadata: MetadataStore,
    retry: RetryPolicy,
    in_flight: InFlightAccounts,
}

impl<R: RemoteTaskService, L: LocalTaskStore> SyncOrchestrator<R, L> {
    pub fn new(remote: R, local: L, metadata: MetadataStore) -> Self {
        Self {
            remote,
            local,
            metadata,
            retry: RetryPolicy::default(),
            in_flight: InFlightAccounts::new(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Share a single-flight registry with other orchestrators
    #[must_use]
    pub fn with_in_flight(mut self, in_flight: InFlightAccounts) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn local(&self) -> &L {
        &self.local
    }

    pub const fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Upload local-only and locally newer tasks. Never touches local tasks.
    pub async fn push(&self, account: &str) -> Result<SyncReport> {
        self.run(account, SyncOperation::Push).await
    }

    /// Download remote-only and remotely newer tasks. Never touches the remote side.
    pub async fn pull(&self, account: &str) -> Result<SyncReport> {
        self.run(account, SyncOperation::Pull).await
    }

    /// Pull then push against one snapshot, resolving conflicts by recency.
    pub async fn sync(&self, account: &str) -> Result<SyncReport> {
        self.run(account, SyncOperation::Sync).await
    }

    async fn run(&self, account: &str, operation: SyncOperation) -> Result<SyncReport> {
        let _flight = self.in_flight.acquire(account)?;
        let mut metadata = self.metadata.load(account)?;
        let mut report = SyncReport::new(account, operation, metadata.auth_state);
        info!(
            "Starting {operation} for {account} (auth state {})",
            metadata.auth_state
        );

        let mut mirror = match MirrorStore::load(&self.remote, account, &self.retry).await {
            Ok(mirror) => mirror,
            Err(error) if error.is_authentication() => {
                return self.abort_on_auth(metadata, report, &error);
            }
            Err(error) => return Err(error.into()),
        };
        report.remote_list_calls = mirror.list_task_calls();
        let allow_create = metadata.auth_state.allows_create();
        // the mirror load was a successful authenticated call
        metadata.auth_state = metadata.auth_state.on_success();

        let mut run = Run {
            remote: &self.remote,
            local: &self.local,
            retry: &self.retry,
            account,
            operation,
            allow_create,
            mirror: &mut mirror,
            mappings: &mut metadata.mappings,
            report,
        };
        let flow = run.execute().await;
        let report = run.report;
        mirror.discard();

        if let ControlFlow::Break(error) = flow? {
            return self.abort_on_auth(metadata, report, &error);
        }

        let mut report = report;
        metadata.record_run(operation, report.counts(), Utc::now());
        self.metadata.save(&metadata)?;
        report.auth_state = metadata.auth_state;

        info!("{}", report.summary());
        Ok(report)
    }

    /// Persist the auth transition and the mappings confirmed so far.
    fn abort_on_auth(
        &self,
        mut metadata: SyncMetadata,
        mut report: SyncReport,
        error: &RemoteError,
    ) -> Result<SyncReport> {
        metadata.auth_state = metadata.auth_state.on_auth_failure();
        warn!(
            "{} for {} aborted: {error}; auth state is now {}",
            report.operation, report.account, metadata.auth_state
        );
        self.metadata.save(&metadata)?;

        report.auth_aborted = true;
        report.auth_state = metadata.auth_state;
        Ok(report)
    }
}

/// Remote work for one list, applied updates first
#[derive(Default)]
struct ListBatch {
    updates: Vec<TaskPair>,
    creates: Vec<TaskRecord>,
}

/// State of a single run
struct Run<'a, R, L> {
    remote: &'a R,
    local: &'a L,
    retry: &'a RetryPolicy,
    account: &'a str,
    operation: SyncOperation,
    /// Create gate, fixed from the auth state at run start
    allow_create: bool,
    mirror: &'a mut MirrorStore,
    mappings: &'a mut MappingTable,
    report: SyncReport,
}

impl<R: RemoteTaskService, L: LocalTaskStore> Run<'_, R, L> {
    async fn execute(&mut self) -> Result<Flow> {
        if self.operation != SyncOperation::Push {
            self.pull_phase()?;
        }
        if self.operation == SyncOperation::Pull {
            return Ok(ControlFlow::Continue(()));
        }
        self.push_phase().await
    }

    /// Local tasks with remote ids filled from the mapping table
    fn local_snapshot(&self) -> Result<Vec<TaskRecord>> {
        let mut tasks = self.local.list_tasks(self.account)?;
        for task in &mut tasks {
            task.remote_id = self.mappings.remote_id_for(&task.id).map(str::to_string);
        }
        Ok(tasks)
    }

    fn diff(&self, local_tasks: &[TaskRecord]) -> MirrorDiff {
        self.mirror.diff(local_tasks, self.mappings)
    }

    fn bind(&mut self, local_id: &str, remote_id: &str, list_id: &str) -> bool {
        match self
            .mappings
            .bind(TaskMapping::new(local_id, remote_id, list_id))
        {
            Ok(_) => true,
            Err(error) => {
                warn!("Could not map {local_id} to {remote_id}: {error}");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    fn pull_phase(&mut self) -> Result<()> {
        let local_tasks = self.local_snapshot()?;
        let diff = self.diff(&local_tasks);
        let mut counts = SyncCounts::default();

        for pair in diff.in_sync.iter().filter(|pair| !pair.mapped) {
            if self.bind(&pair.local.id, &pair.remote.remote_id, pair.list_id()) {
                counts.skipped += 1;
            } else {
                counts.failed += 1;
            }
        }

        for pair in &diff.conflicting {
            match ConflictResolver::resolve(&pair.local.fields, &pair.remote.fields) {
                Winner::Remote => {
                    if !pair.mapped
                        && !self.bind(&pair.local.id, &pair.remote.remote_id, pair.list_id())
                    {
                        counts.failed += 1;
                        continue;
                    }
                    // copying the remote timestamp leaves the pair in sync next run
                    self.local.update_task(&pair.local.id, &pair.remote.fields)?;
                    counts.updated += 1;
                }
                Winner::Local if self.operation == SyncOperation::Pull => {
                    if pair.mapped
                        || self.bind(&pair.local.id, &pair.remote.remote_id, pair.list_id())
                    {
                        counts.skipped += 1;
                    } else {
                        counts.failed += 1;
                    }
                }
                Winner::Local => {}
            }
        }

        for orphan in diff.orphaned.iter().filter(|task| task.is_live()) {
            debug!("Remote copy of {} is gone; deleting locally", orphan.id);
            self.local.mark_deleted(&orphan.id)?;
            counts.updated += 1;
        }

        let mut pool: Deduplicator = local_tasks
            .iter()
            .map(|task| (task.list_id.as_str(), task.id.as_str(), &task.fields))
            .collect();
        for remote in diff.remote_only.iter().filter(|record| record.is_live()) {
            if let Some(existing) = pool.find_duplicate(&remote.list_id, &remote.fields) {
                debug!(
                    "Remote task {} duplicates local task {existing}; not pulled",
                    remote.remote_id
                );
                counts.skipped += 1;
                continue;
            }

            let local_id = self
                .local
                .create_task(self.account, &remote.list_id, &remote.fields)?;
            if self.bind(&local_id, &remote.remote_id, &remote.list_id) {
                counts.created += 1;
            } else {
                counts.failed += 1;
            }
            pool.insert(&remote.list_id, &local_id, &remote.fields);
        }

        self.report.pulled = counts;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    async fn push_phase(&mut self) -> Result<Flow> {
        let local_tasks = self.local_snapshot()?;
        let diff = self.diff(&local_tasks);

        for pair in diff.in_sync.iter().filter(|pair| !pair.mapped) {
            if self.bind(&pair.local.id, &pair.remote.remote_id, pair.list_id()) {
                self.report.pushed.skipped += 1;
            } else {
                self.report.pushed.failed += 1;
            }
        }

        for orphan in diff.orphaned.iter().filter(|task| task.is_live()) {
            debug!("Remote copy of {} is gone; not re-created", orphan.id);
            self.report.pushed.skipped += 1;
        }

        let mut order: Vec<String> = self.mirror.lists().to_vec();
        let mut batches: HashMap<String, ListBatch> = HashMap::new();

        for pair in diff.conflicting {
            match ConflictResolver::resolve(&pair.local.fields, &pair.remote.fields) {
                Winner::Local => batches
                    .entry(pair.list_id().to_string())
                    .or_default()
                    .updates
                    .push(pair),
                Winner::Remote if self.operation == SyncOperation::Push => {
                    if pair.mapped
                        || self.bind(&pair.local.id, &pair.remote.remote_id, pair.list_id())
                    {
                        self.report.pushed.skipped += 1;
                    } else {
                        self.report.pushed.failed += 1;
                    }
                }
                Winner::Remote => {}
            }
        }

        for record in diff.local_only.into_iter().filter(TaskRecord::is_live) {
            if !order.contains(&record.list_id) {
                order.push(record.list_id.clone());
            }
            batches
                .entry(record.list_id.clone())
                .or_default()
                .creates
                .push(record);
        }

        for list_id in order {
            let Some(batch) = batches.remove(&list_id) else {
                continue;
            };
            for pair in batch.updates {
                if let ControlFlow::Break(error) = self.push_update(pair).await {
                    return Ok(ControlFlow::Break(error));
                }
            }
            if let ControlFlow::Break(error) = self.push_creates(&list_id, batch.creates).await {
                return Ok(ControlFlow::Break(error));
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    async fn push_update(&mut self, pair: TaskPair) -> Flow {
        let TaskPair {
            local,
            remote,
            mapped,
        } = pair;

        if let Err(error) = local.fields.validate() {
            warn!("Task {} not pushed: {error}", local.id);
            self.report.pushed.failed += 1;
            return ControlFlow::Continue(());
        }
        if !mapped && !self.bind(&local.id, &remote.remote_id, &remote.list_id) {
            self.report.pushed.failed += 1;
            return ControlFlow::Continue(());
        }

        let (service, retry) = (self.remote, self.retry);
        let (list_id, remote_id, fields) = (&remote.list_id, &remote.remote_id, &local.fields);
        let result = if local.is_live() {
            retry
                .run("update task", || service.update_task(list_id, remote_id, fields))
                .await
        } else {
            retry
                .run("delete task", || service.delete_task(list_id, remote_id))
                .await
        };

        match result {
            Ok(()) => {
                self.report.pushed.updated += 1;
                self.mirror.upsert(MirrorRecord {
                    fields: local.fields,
                    ..remote
                });
                ControlFlow::Continue(())
            }
            Err(error) => self.record_failure(error, "update", &local.id),
        }
    }

    async fn push_creates(&mut self, list_id: &str, creates: Vec<TaskRecord>) -> Flow {
        if creates.is_empty() {
            return ControlFlow::Continue(());
        }
        if !self.allow_create {
            info!(
                "Auth state is blocked; skipping {} creates in list {list_id}",
                creates.len()
            );
            self.report.pushed.skipped += creates.len();
            return ControlFlow::Continue(());
        }

        let mut pool: Deduplicator = self
            .mirror
            .records_in(list_id)
            .map(|record| (list_id, record.remote_id.as_str(), &record.fields))
            .collect();
        let mut authoritative: Option<Deduplicator> = None;

        for (index, record) in creates.iter().enumerate() {
            if let Err(error) = record.fields.validate() {
                warn!("Task {} not pushed: {error}", record.id);
                self.report.pushed.failed += 1;
                continue;
            }
            if let Some(existing) = pool.find_duplicate(list_id, &record.fields) {
                debug!("Task {} duplicates remote task {existing}; not created", record.id);
                self.report.pushed.skipped += 1;
                continue;
            }

            if authoritative.is_none() {
                match self.refetch_list(list_id).await {
                    Ok(fresh) => authoritative = Some(fresh),
                    Err(error) if error.is_authentication() => return ControlFlow::Break(error),
                    Err(error) => {
                        let remaining = creates.len() - index;
                        warn!(
                            "Could not re-check list {list_id} before creating; \
                             {remaining} tasks not pushed: {error}"
                        );
                        self.report.pushed.failed += remaining;
                        return ControlFlow::Continue(());
                    }
                }
            }
            let fresh = authoritative.get_or_insert_with(Deduplicator::new);

            if let Some(existing) = fresh.find_duplicate(list_id, &record.fields) {
                let existing = existing.to_string();
                if self.mappings.by_remote(&existing).is_none() {
                    self.bind(&record.id, &existing, list_id);
                }
                debug!("Task {} already exists remotely as {existing}; bound", record.id);
                self.report.pushed.skipped += 1;
                continue;
            }

            match self.create_remote(list_id, &record.fields).await {
                Ok(remote_id) => {
                    if self.bind(&record.id, &remote_id, list_id) {
                        self.report.pushed.created += 1;
                    } else {
                        self.report.pushed.failed += 1;
                    }
                    pool.insert(list_id, &remote_id, &record.fields);
                    fresh.insert(list_id, &remote_id, &record.fields);
                    self.mirror.upsert(MirrorRecord {
                        remote_id,
                        list_id: list_id.to_string(),
                        fields: record.fields.clone(),
                        hidden: false,
                    });
                }
                Err(error) => {
                    if let ControlFlow::Break(error) = self.record_failure(error, "create", &record.id)
                    {
                        return ControlFlow::Break(error);
                    }
                }
            }
        }

        ControlFlow::Continue(())
    }

    /// Authoritative listing taken right before a list's creates
    async fn refetch_list(&mut self, list_id: &str) -> RemoteResult<Deduplicator> {
        let service = self.remote;
        let tasks = self
            .retry
            .run("list tasks", || {
                service.list_tasks(list_id, ListTasksQuery::everything())
            })
            .await?;

        let fresh: Deduplicator = tasks
            .iter()
            .map(|task| (list_id, task.id.as_str(), &task.fields))
            .collect();
        self.mirror.stage_list(list_id, tasks);
        Ok(fresh)
    }

    /// Create a task, checking before each retry whether an earlier attempt landed.
    async fn create_remote(&self, list_id: &str, fields: &TaskFields) -> RemoteResult<String> {
        let service = self.remote;
        let wanted = signature(fields);
        let attempts = Cell::new(0_u32);

        self.retry
            .run("create task", || {
                let attempt = attempts.get();
                attempts.set(attempt + 1);
                create_once(service, list_id, fields, &wanted, attempt > 0)
            })
            .await
    }

    fn record_failure(&mut self, error: RemoteError, action: &str, local_id: &str) -> Flow {
        if error.is_authentication() {
            return ControlFlow::Break(error);
        }
        warn!("Failed to {action} remote copy of {local_id}: {error}");
        self.report.pushed.failed += 1;
        ControlFlow::Continue(())
    }
}

async fn create_once<R: RemoteTaskService>(
    service: &R,
    list_id: &str,
    fields: &TaskFields,
    wanted: &Signature,
    recheck: bool,
) -> RemoteResult<String> {
    if recheck {
        let existing = service
            .list_tasks(list_id, ListTasksQuery::everything())
            .await?
            .into_iter()
            .find(|task| task.fields.status.is_live() && signature(&task.fields) == *wanted);
        if let Some(task) = existing {
            debug!("Earlier create attempt landed as {}", task.id);
            return Ok(task.id);
        }
    }
    service.create_task(list_id, fields).await
}
