use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::{TaskDefinition, TaskDraft, TaskState};
use crate::errors::AppError;

pub mod queries;


/// Initialize the SQLite connection pool with appropriate options.
///
/// # Arguments
///
/// * `database_url` - The database URL string.
///
/// # Returns
/// * `Pool<Sqlite>` - The initialized SQLite connection pool.
pub async fn init_pool(database_url: &str) -> sqlx::Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskOrder {
    #[default]
    Id,
    /// Earliest `next_execution` first, ties broken by id.
    NextExecution,
}

/// Selection criteria for [`TaskStore::query`]. Unset fields don't filter.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub id: Option<i64>,
    pub state: Option<TaskState>,
    /// Only tasks with `next_execution <= due_at`.
    pub due_at: Option<DateTime<Utc>>,
    /// Only tasks that have a `next_execution` at all.
    pub scheduled_only: bool,
    pub order: TaskOrder,
    pub limit: Option<i64>,
}

impl TaskFilter {
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn due(at: DateTime<Utc>) -> Self {
        Self {
            state: Some(TaskState::Enabled),
            due_at: Some(at),
            scheduled_only: true,
            order: TaskOrder::NextExecution,
            ..Self::default()
        }
    }
}

/// Persistence port for task definitions.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new task and returns it with its assigned id.
    async fn insert(&self, draft: TaskDraft) -> Result<TaskDefinition, AppError>;

    /// Writes every mutable column of `task`. `created` and `created_by` are
    /// never written. Fails with `NotFound` when the row doesn't exist.
    async fn update(&self, task: &TaskDefinition) -> Result<(), AppError>;

    async fn query(&self, filter: &TaskFilter) -> Result<Vec<TaskDefinition>, AppError>;

    async fn get(&self, id: i64) -> Result<Option<TaskDefinition>, AppError> {
        let mut tasks = self.query(&TaskFilter::by_id(id)).await?;
        Ok(tasks.pop())
    }
}
