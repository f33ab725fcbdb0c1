//! # Task Repository
//!
//! Write-through persistence for the task queue.
//!
//! ## Overview
//!
//! The queue's in-memory index is the source of truth for scheduling and
//! duplicate suppression. Every state change is mirrored here so that a
//! restarted process can pick up pending work again (see
//! [`TaskQueue::restore`](crate::queue::TaskQueue::restore)).
//!
//! Rows are keyed by `(task_type, id)` and written with upsert semantics.
//! Timestamps are stored as Unix milliseconds.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::task::{Backoff, Task, TaskKey, TaskStatus};

/// Repository trait for task persistence
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert the task or overwrite the stored row with the same key
    async fn upsert(&self, task: &Task) -> Result<()>;

    /// Find a task by key
    async fn find(&self, key: &TaskKey) -> Result<Option<Task>>;

    /// All pending and processing tasks, oldest first
    async fn load_active(&self) -> Result<Vec<Task>>;

    /// Count tasks by status
    async fn count_by_status(&self, status: TaskStatus) -> Result<u64>;

    /// Delete terminal tasks last updated before `cutoff`
    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLite implementation of [`TaskRepository`]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Create a new repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database file at `path` and initialize
    /// the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Opening task database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        let repository = Self::new(pool);
        repository.initialize().await?;
        Ok(repository)
    }

    /// Single-connection in-memory database, schema initialized.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(":memory:")
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        let repository = Self::new(pool);
        repository.initialize().await?;
        Ok(repository)
    }

    /// Initialize database table if it doesn't exist
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                task_type TEXT NOT NULL,
                id TEXT NOT NULL,
                payload BLOB NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                backoff TEXT NOT NULL,
                process_after INTEGER,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (task_type, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_status_updated
            ON tasks(status, updated_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        debug!("Task table initialized");
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn upsert(&self, task: &Task) -> Result<()> {
        let backoff = serde_json::to_string(&task.backoff)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (
                task_type, id, payload, status, attempts, max_attempts, backoff,
                process_after, last_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_type, id) DO UPDATE SET
                payload = excluded.payload,
                status = excluded.status,
                attempts = excluded.attempts,
                max_attempts = excluded.max_attempts,
                backoff = excluded.backoff,
                process_after = excluded.process_after,
                last_error = excluded.last_error,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&task.task_type)
        .bind(&task.id)
        .bind(&task.payload)
        .bind(task.status.as_str())
        .bind(task.attempts as i64)
        .bind(task.max_attempts as i64)
        .bind(backoff)
        .bind(task.process_after.map(|at| at.timestamp_millis()))
        .bind(&task.last_error)
        .bind(task.created_at.timestamp_millis())
        .bind(task.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find(&self, key: &TaskKey) -> Result<Option<Task>> {
        let row = sqlx::query(
            r#"
            SELECT task_type, id, payload, status, attempts, max_attempts, backoff,
                   process_after, last_error, created_at, updated_at
            FROM tasks
            WHERE task_type = ? AND id = ?
            "#,
        )
        .bind(&key.task_type)
        .bind(&key.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn load_active(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query(
            r#"
            SELECT task_type, id, payload, status, attempts, max_attempts, backoff,
                   process_after, last_error, created_at, updated_at
            FROM tasks
            WHERE status IN ('pending', 'processing')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(count as u64)
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN ('succeeded', 'skipped', 'revoked', 'failed')
              AND updated_at < ?
            "#,
        )
        .bind(cutoff.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let backoff: Backoff = serde_json::from_str(&row.get::<String, _>("backoff"))
        .map_err(|e| SyncError::Database(format!("invalid backoff column: {e}")))?;

    Ok(Task {
        task_type: row.get("task_type"),
        id: row.get("id"),
        payload: row.get("payload"),
        max_attempts: row.get::<i64, _>("max_attempts") as u32,
        backoff,
        delay: Duration::ZERO,
        process_after: row
            .get::<Option<i64>, _>("process_after")
            .map(timestamp)
            .transpose()?,
        created_at: timestamp(row.get("created_at"))?,
        updated_at: timestamp(row.get("updated_at"))?,
        status: row.get::<String, _>("status").parse()?,
        attempts: row.get::<i64, _>("attempts") as u32,
        last_error: row.get("last_error"),
    })
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| SyncError::Database(format!("invalid timestamp: {millis}")))
}
