use crate::cron::CronRuleSet;
use crate::db::{TaskFilter, TaskOrder, TaskStore};
use crate::domain::{ExecutionRules, Params, TaskDefinition, TaskDraft};
use crate::errors::AppError;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, types::Json};

const TASK_COLUMNS: &str = r#"id, title, "type", state, cron_rules, execution_rules, params, next_execution, created, created_by"#;

/// `TaskStore` backed by the `scheduler_tasks` table.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn task_from_row(row: &SqliteRow) -> sqlx::Result<TaskDefinition> {
    Ok(TaskDefinition {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        task_type: row.try_get("type")?,
        state: row.try_get("state")?,
        cron_rules: row.try_get::<Json<CronRuleSet>, _>("cron_rules")?.0,
        execution_rules: row.try_get::<Json<ExecutionRules>, _>("execution_rules")?.0,
        params: row.try_get::<Json<Params>, _>("params")?.0,
        next_execution: row.try_get("next_execution")?,
        created: row.try_get("created")?,
        created_by: row.try_get("created_by")?,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    /// Inserts a new row and returns the task with the id SQLite assigned.
    ///
    /// # Arguments
    ///
    /// * `draft` - The validated task to persist.
    ///
    /// # Returns
    /// * `Result<TaskDefinition, AppError>` - The stored task, or `StoreUnavailable`.
    async fn insert(&self, draft: TaskDraft) -> Result<TaskDefinition, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO scheduler_tasks
                (title, "type", state, cron_rules, execution_rules, params, next_execution, created, created_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.task_type)
        .bind(draft.state)
        .bind(Json(&draft.cron_rules))
        .bind(Json(&draft.execution_rules))
        .bind(Json(&draft.params))
        .bind(draft.next_execution)
        .bind(draft.created)
        .bind(draft.created_by)
        .execute(&self.pool)
        .await?;

        Ok(draft.into_task(result.last_insert_rowid()))
    }

    async fn update(&self, task: &TaskDefinition) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE scheduler_tasks
            SET title = ?, "type" = ?, state = ?, cron_rules = ?, execution_rules = ?,
                params = ?, next_execution = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.title)
        .bind(&task.task_type)
        .bind(task.state)
        .bind(Json(&task.cron_rules))
        .bind(Json(&task.execution_rules))
        .bind(Json(&task.params))
        .bind(task.next_execution)
        .bind(task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(task.id));
        }

        Ok(())
    }

    async fn query(&self, filter: &TaskFilter) -> Result<Vec<TaskDefinition>, AppError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {TASK_COLUMNS} FROM scheduler_tasks WHERE 1 = 1"
        ));

        if let Some(id) = filter.id {
            builder.push(" AND id = ").push_bind(id);
        }
        if let Some(state) = filter.state {
            builder.push(" AND state = ").push_bind(state);
        }
        if filter.scheduled_only {
            builder.push(" AND next_execution IS NOT NULL");
        }
        if let Some(at) = filter.due_at {
            builder.push(" AND next_execution <= ").push_bind(at);
        }

        match filter.order {
            TaskOrder::Id => builder.push(" ORDER BY id ASC"),
            TaskOrder::NextExecution => builder.push(" ORDER BY next_execution ASC, id ASC"),
        };

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        let tasks = rows
            .iter()
            .map(task_from_row)
            .collect::<sqlx::Result<Vec<_>>>()?;

        Ok(tasks)
    }
}
