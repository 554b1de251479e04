use tasksync_core::db::{Database, LocalTaskStore, SqliteTaskStore};
use tasksync_core::models::SyncOperation;
use tasksync_core::remote::{HttpTaskService, RemoteTaskService};
use tasksync_core::{MetadataStore, SyncOrchestrator, SyncReport};

use crate::commands::common::{load_settings, CliPaths};
use crate::error::CliError;

pub async fn run_sync_operation(
    operation: SyncOperation,
    account: Option<&str>,
    paths: &CliPaths,
) -> Result<(), CliError> {
    let settings = load_settings(&paths.config)?;
    let account = settings.resolve_account(account);
    let profile = settings.profile(&account);
    let token = profile
        .access_token()
        .map_err(|error| CliError::Config(error.to_string()))?;
    let remote = HttpTaskService::new(profile.api_base_url(), token)?;

    let db = Database::open(&paths.db)?;
    let orchestrator = SyncOrchestrator::new(
        remote,
        SqliteTaskStore::new(db.connection()),
        MetadataStore::new(&paths.metadata_dir),
    )
    .with_retry_policy(settings.retry_policy());

    let report = execute(&orchestrator, operation, &account).await?;
    println!("{}", report.summary());
    ensure_completed(&report)
}

pub async fn execute<R: RemoteTaskService, L: LocalTaskStore>(
    orchestrator: &SyncOrchestrator<R, L>,
    operation: SyncOperation,
    account: &str,
) -> Result<SyncReport, CliError> {
    let report = match operation {
        SyncOperation::Push => orchestrator.push(account).await?,
        SyncOperation::Pull => orchestrator.pull(account).await?,
        SyncOperation::Sync => orchestrator.sync(account).await?,
    };
    Ok(report)
}

/// An auth-aborted run exits non-zero; per-task failures are reported in the summary only.
pub fn ensure_completed(report: &SyncReport) -> Result<(), CliError> {
    if report.auth_aborted {
        return Err(CliError::AuthAborted {
            operation: report.operation,
            account: report.account.clone(),
            state: report.auth_state,
        });
    }
    Ok(())
}
