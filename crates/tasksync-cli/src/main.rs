//! tasksync CLI - push, pull and sync tasks with a remote task-list service

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;
use tasksync_core::models::SyncOperation;

use crate::cli::{Cli, Commands};
use crate::commands::common::CliPaths;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync_operation;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "tasksync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = CliPaths::resolve(cli.db_path, cli.metadata_dir, cli.config)?;

    match cli.command {
        Commands::Push(args) => {
            run_sync_operation(SyncOperation::Push, args.account.as_deref(), &paths).await?;
        }
        Commands::Pull(args) => {
            run_sync_operation(SyncOperation::Pull, args.account.as_deref(), &paths).await?;
        }
        Commands::Sync(args) => {
            run_sync_operation(SyncOperation::Sync, args.account.as_deref(), &paths).await?;
        }
        Commands::Status {
            account,
            limit,
            json,
        } => run_status(account.account.as_deref(), limit, json, &paths)?,
    }

    Ok(())
}
