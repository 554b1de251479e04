use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Synchronize local tasks with a remote task-list service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local task database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Directory holding per-account sync metadata
    #[arg(long, global = true, value_name = "DIR")]
    pub metadata_dir: Option<PathBuf>,

    /// Optional path to the settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload local-only and locally newer tasks
    Push(AccountArgs),
    /// Download remote-only and remotely newer tasks
    Pull(AccountArgs),
    /// Pull then push, resolving conflicts by recency
    Sync(AccountArgs),
    /// Show persisted sync state for an account
    Status {
        #[command(flatten)]
        account: AccountArgs,
        /// Number of recent runs to show
        #[arg(short, long, default_value = "5")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AccountArgs {
    /// Account name (defaults to $TASKSYNC_ACCOUNT, then the configured default)
    #[arg(long, value_name = "NAME")]
    pub account: Option<String>,
}
