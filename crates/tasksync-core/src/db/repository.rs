//! Local task store implementation

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{TaskFields, TaskId, TaskRecord, TaskStatus};

const DUE_FORMAT: &str = "%Y-%m-%d";

/// Trait for local task storage operations
///
/// Local reads and writes are treated as fast and never suspend, so the
/// trait is synchronous even though the sync engine around it is async.
pub trait LocalTaskStore {
    /// List every task of an account, including soft-deleted ones
    fn list_tasks(&self, account: &str) -> Result<Vec<TaskRecord>>;

    /// Create a task and return its new local id
    fn create_task(&self, account: &str, list_id: &str, fields: &TaskFields) -> Result<String>;

    /// Overwrite a task's fields, including `modified_at`
    fn update_task(&self, local_id: &str, fields: &TaskFields) -> Result<()>;

    /// Soft delete a task
    fn mark_deleted(&self, local_id: &str) -> Result<()>;
}

/// `SQLite` implementation of `LocalTaskStore`
pub struct SqliteTaskStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTaskStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a task by local ID, deleted or not
    pub fn get(&self, local_id: &str) -> Result<Option<TaskRecord>> {
        let task = self
            .conn
            .query_row(
                "SELECT id, list_id, title, notes, due, status, modified_at
                 FROM tasks WHERE id = ?",
                params![local_id],
                Self::parse_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Parse a task from a database row
    fn parse_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRecord> {
        let due = row
            .get::<_, Option<String>>(4)?
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, DUE_FORMAT)
                    .map_err(|error| conversion_error(4, error))
            })
            .transpose()?;
        let status = row
            .get::<_, String>(5)?
            .parse::<TaskStatus>()
            .map_err(|error| conversion_error(5, error))?;
        let modified_ms: i64 = row.get(6)?;
        let modified_at = DateTime::<Utc>::from_timestamp_millis(modified_ms)
            .ok_or_else(|| conversion_error(6, Error::InvalidInput(modified_ms.to_string())))?;

        Ok(TaskRecord {
            id: row.get(0)?,
            remote_id: None,
            list_id: row.get(1)?,
            fields: TaskFields {
                title: row.get(2)?,
                notes: row.get(3)?,
                due,
                status,
                modified_at,
            },
        })
    }
}

fn conversion_error(
    column: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

fn format_due(due: Option<NaiveDate>) -> Option<String> {
    due.map(|date| date.format(DUE_FORMAT).to_string())
}

impl LocalTaskStore for SqliteTaskStore<'_> {
    fn list_tasks(&self, account: &str) -> Result<Vec<TaskRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, list_id, title, notes, due, status, modified_at
             FROM tasks
             WHERE account = ?
             ORDER BY list_id ASC, modified_at ASC, id ASC",
        )?;

        let tasks = stmt
            .query_map(params![account], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tasks)
    }

    fn create_task(&self, account: &str, list_id: &str, fields: &TaskFields) -> Result<String> {
        let id = TaskId::new().as_str();
        let now = Utc::now().timestamp_millis();

        self.conn.execute(
            "INSERT INTO tasks (id, account, list_id, title, notes, due, status, created_at, modified_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                account,
                list_id,
                fields.title,
                fields.notes,
                format_due(fields.due),
                fields.status.as_str(),
                now,
                fields.modified_at.timestamp_millis()
            ],
        )?;

        Ok(id)
    }

    fn update_task(&self, local_id: &str, fields: &TaskFields) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE tasks SET title = ?, notes = ?, due = ?, status = ?, modified_at = ? WHERE id = ?",
            params![
                fields.title,
                fields.notes,
                format_due(fields.due),
                fields.status.as_str(),
                fields.modified_at.timestamp_millis(),
                local_id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(local_id.to_string()));
        }

        Ok(())
    }

    fn mark_deleted(&self, local_id: &str) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        let rows = self.conn.execute(
            "UPDATE tasks SET status = 'deleted', modified_at = ? WHERE id = ? AND status != 'deleted'",
            params![now, local_id],
        )?;

        if rows == 0 && self.get(local_id)?.is_none() {
            return Err(Error::NotFound(local_id.to_string()));
        }

        Ok(())
    }
}
