use chrono::{DateTime, Utc};
use serde::Serialize;
use tasksync_core::models::{AuthState, SyncLogEntry, SyncMetadata};
use tasksync_core::MetadataStore;

use crate::commands::common::{format_timestamp, load_settings, CliPaths};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub account: String,
    pub auth_state: AuthState,
    pub last_push_at: Option<DateTime<Utc>>,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub mapped_tasks: usize,
    pub recent_runs: Vec<SyncLogEntry>,
}

impl StatusView {
    pub fn from_metadata(metadata: &SyncMetadata, limit: usize) -> Self {
        Self {
            account: metadata.account.clone(),
            auth_state: metadata.auth_state,
            last_push_at: metadata.last_push_at,
            last_pull_at: metadata.last_pull_at,
            last_sync_at: metadata.last_sync_at,
            mapped_tasks: metadata.mappings.len(),
            recent_runs: metadata.recent_log(limit).cloned().collect(),
        }
    }
}

pub fn run_status(
    account: Option<&str>,
    limit: usize,
    as_json: bool,
    paths: &CliPaths,
) -> Result<(), CliError> {
    let settings = load_settings(&paths.config)?;
    let account = settings.resolve_account(account);
    let metadata = MetadataStore::new(&paths.metadata_dir).load(&account)?;
    let view = StatusView::from_metadata(&metadata, limit);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    for line in format_status_lines(&view) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(view: &StatusView) -> Vec<String> {
    let mut lines = vec![
        format!("Account:      {}", view.account),
        format!("Auth state:   {}", view.auth_state),
        format!("Last push:    {}", format_timestamp(view.last_push_at)),
        format!("Last pull:    {}", format_timestamp(view.last_pull_at)),
        format!("Last sync:    {}", format_timestamp(view.last_sync_at)),
        format!("Mapped tasks: {}", view.mapped_tasks),
    ];

    if view.auth_state == AuthState::Blocked {
        lines.push("Creates are paused until an authenticated call succeeds.".to_string());
    }

    if view.recent_runs.is_empty() {
        lines.push("No sync runs recorded.".to_string());
        return lines;
    }

    lines.push("Recent runs:".to_string());
    for entry in &view.recent_runs {
        lines.push(format!(
            "  {}  {:<4}  created {}, updated {}, skipped {}, failed {}",
            format_timestamp(Some(entry.timestamp)),
            entry.operation.as_str(),
            entry.counts.created,
            entry.counts.updated,
            entry.counts.skipped,
            entry.counts.failed
        ));
    }
    lines
}
