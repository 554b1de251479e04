//! Local task storage for tasksync

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{LocalTaskStore, SqliteTaskStore};
