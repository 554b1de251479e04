use std::cell::RefCell;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::Parser;
use pretty_assertions::assert_eq;
use tasksync_core::db::{Database, LocalTaskStore, SqliteTaskStore};
use tasksync_core::models::{AuthState, SyncCounts, SyncMetadata, SyncOperation, TaskFields};
use tasksync_core::remote::{
    ListTasksQuery, RemoteError, RemoteResult, RemoteTask, RemoteTaskService, RetryPolicy,
};
use tasksync_core::{MetadataStore, SyncOrchestrator};

use crate::cli::{Cli, Commands};
use crate::commands::common::{format_timestamp, CliPaths};
use crate::commands::status::{format_status_lines, run_status, StatusView};
use crate::commands::sync::{ensure_completed, execute};
use crate::error::CliError;

/// Single-list remote that stores what it is given
#[derive(Default)]
struct StubRemote {
    reject_token: bool,
    tasks: RefCell<Vec<RemoteTask>>,
}

impl RemoteTaskService for StubRemote {
    async fn list_task_lists(&self, _account: &str) -> RemoteResult<Vec<String>> {
        if self.reject_token {
            return Err(RemoteError::Authentication("invalid token".to_string()));
        }
        Ok(vec!["inbox".to_string()])
    }

    async fn list_tasks(
        &self,
        list_id: &str,
        _query: ListTasksQuery,
    ) -> RemoteResult<Vec<RemoteTask>> {
        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|task| task.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn create_task(&self, list_id: &str, fields: &TaskFields) -> RemoteResult<String> {
        let id = format!("remote-{}", self.tasks.borrow().len() + 1);
        self.tasks.borrow_mut().push(RemoteTask {
            id: id.clone(),
            list_id: list_id.to_string(),
            fields: fields.clone(),
            hidden: false,
        });
        Ok(id)
    }

    async fn update_task(
        &self,
        _list_id: &str,
        _remote_id: &str,
        _fields: &TaskFields,
    ) -> RemoteResult<()> {
        Ok(())
    }

    async fn delete_task(&self, _list_id: &str, _remote_id: &str) -> RemoteResult<()> {
        Ok(())
    }
}

#[test]
fn parses_operation_with_account_and_global_flags() {
    let cli = Cli::try_parse_from([
        "tasksync",
        "push",
        "--account",
        "work",
        "--db-path",
        "/tmp/tasks.db",
    ])
    .unwrap();

    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/tasks.db")));
    match cli.command {
        Commands::Push(args) => assert_eq!(args.account.as_deref(), Some("work")),
        _ => panic!("expected push"),
    }
}

#[test]
fn parses_status_defaults() {
    let cli = Cli::try_parse_from(["tasksync", "status"]).unwrap();
    match cli.command {
        Commands::Status {
            account,
            limit,
            json,
        } => {
            assert_eq!(account.account, None);
            assert_eq!(limit, 5);
            assert!(!json);
        }
        _ => panic!("expected status"),
    }
}

#[test]
fn rejects_unknown_command() {
    assert!(Cli::try_parse_from(["tasksync", "merge"]).is_err());
}

#[test]
fn explicit_paths_are_kept() {
    let paths = CliPaths::resolve(
        Some(PathBuf::from("/data/tasks.db")),
        Some(PathBuf::from("/data/meta")),
        Some(PathBuf::from("/etc/tasksync.json")),
    )
    .unwrap();

    assert_eq!(
        paths,
        CliPaths {
            db: PathBuf::from("/data/tasks.db"),
            metadata_dir: PathBuf::from("/data/meta"),
            config: PathBuf::from("/etc/tasksync.json"),
        }
    );
}

#[test]
fn format_timestamp_handles_never() {
    assert_eq!(format_timestamp(None), "never");
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
    assert_eq!(format_timestamp(Some(at)), "2024-05-01 09:30:00 UTC");
}

#[test]
fn status_lines_for_fresh_account() {
    let view = StatusView::from_metadata(&SyncMetadata::new("work"), 5);
    let lines = format_status_lines(&view);

    assert!(lines.contains(&"Auth state:   NORMAL".to_string()));
    assert!(lines.contains(&"Last push:    never".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("No sync runs recorded."));
}

#[test]
fn status_lines_show_recent_runs_newest_first() {
    let mut metadata = SyncMetadata::new("work");
    metadata.auth_state = AuthState::Blocked;
    metadata.record_run(
        SyncOperation::Pull,
        SyncCounts {
            created: 2,
            ..SyncCounts::default()
        },
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
    );
    metadata.record_run(
        SyncOperation::Push,
        SyncCounts {
            failed: 1,
            ..SyncCounts::default()
        },
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
    );

    let view = StatusView::from_metadata(&metadata, 1);
    let lines = format_status_lines(&view);

    assert!(lines
        .iter()
        .any(|line| line.starts_with("Creates are paused")));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("  2024-05-02 09:00:00 UTC  push  created 0, updated 0, skipped 0, failed 1")
    );

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["auth_state"], "BLOCKED");
    assert_eq!(json["recent_runs"].as_array().map(Vec::len), Some(1));
}

#[test]
fn run_status_reads_metadata_dir() {
    let dir = tempfile::tempdir().unwrap();
    let paths = CliPaths {
        db: dir.path().join("tasks.db"),
        metadata_dir: dir.path().join("metadata"),
        config: dir.path().join("config.json"),
    };

    MetadataStore::new(&paths.metadata_dir)
        .save(&SyncMetadata::new("work"))
        .unwrap();

    assert!(run_status(Some("work"), 5, true, &paths).is_ok());
    assert!(run_status(Some("work"), 5, false, &paths).is_ok());
}

#[tokio::test(flavor = "current_thread")]
async fn execute_push_then_status_reflects_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let local = SqliteTaskStore::new(db.connection());
    local
        .create_task("work", "inbox", &TaskFields::new("Buy milk"))
        .unwrap();

    let orchestrator = SyncOrchestrator::new(
        StubRemote::default(),
        local,
        MetadataStore::new(dir.path()),
    )
    .with_retry_policy(RetryPolicy::none());

    let report = execute(&orchestrator, SyncOperation::Push, "work")
        .await
        .unwrap();
    assert!(ensure_completed(&report).is_ok());
    assert_eq!(report.pushed.created, 1);
    assert_eq!(orchestrator.remote().tasks.borrow().len(), 1);

    let metadata = MetadataStore::new(dir.path()).load("work").unwrap();
    let view = StatusView::from_metadata(&metadata, 5);
    assert_eq!(view.mapped_tasks, 1);
    assert!(view.last_push_at.is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn auth_abort_becomes_cli_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_in_memory().unwrap();
    let orchestrator = SyncOrchestrator::new(
        StubRemote {
            reject_token: true,
            ..StubRemote::default()
        },
        SqliteTaskStore::new(db.connection()),
        MetadataStore::new(dir.path()),
    );

    let report = execute(&orchestrator, SyncOperation::Sync, "work")
        .await
        .unwrap();
    let error = ensure_completed(&report).unwrap_err();

    assert!(matches!(
        error,
        CliError::AuthAborted {
            state: AuthState::AuthFailed,
            ..
        }
    ));
    assert!(error.to_string().contains("AUTH_FAILED"));
}
