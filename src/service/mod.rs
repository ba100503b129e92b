use crate::db::{TaskFilter, TaskOrder, TaskStore};
use crate::domain::{NewTask, TaskDefinition, TaskDraft, TaskPatch, TaskState};
use crate::errors::AppError;
use crate::registry::TaskTypeRegistry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;
use tokio::sync::mpsc::Sender;


pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One async lock per task id, so read-modify-write cycles on the same task
/// never interleave. An entry lives only while some caller holds or waits
/// for it.
#[derive(Clone, Default)]
struct TaskLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TaskLocks {
    async fn acquire(&self, id: i64) -> TaskLockGuard {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id).or_default())
        };

        TaskLockGuard {
            id,
            locks: self.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct TaskLockGuard {
    id: i64,
    locks: TaskLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TaskLockGuard {
    fn drop(&mut self) {
        // release the task lock first, so its Arc is no longer counted
        drop(self.guard.take());

        let mut locks = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

#[derive(Clone)]
pub struct TaskCatalog {
    store: Arc<dyn TaskStore>,
    registry: Arc<TaskTypeRegistry>,
    scheduler_tx: Sender<()>,
    locks: TaskLocks,
    clock: Clock,
}

impl TaskCatalog {
    pub fn new(
        store: Arc<dyn TaskStore>,
        registry: Arc<TaskTypeRegistry>,
        scheduler_tx: Sender<()>,
    ) -> Self {
        Self {
            store,
            registry,
            scheduler_tx,
            locks: TaskLocks::default(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replaces the wall clock used for `created` and schedule recomputation.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn registry(&self) -> &TaskTypeRegistry {
        &self.registry
    }

    /// Validates and persists a new, enabled task with its first execution
    /// time computed.
    ///
    /// # Errors
    ///
    /// * `UnknownType`, `InvalidTitle`, `InvalidExecutionRules`,
    ///   `InvalidRuleSet`, `Unsatisfiable` - nothing is persisted.
    /// * `StoreUnavailable` - the insert failed.
    pub async fn create(&self, input: NewTask) -> Result<TaskDefinition, AppError> {
        if !self.registry.contains(&input.task_type) {
            return Err(AppError::UnknownType(input.task_type));
        }

        let title = normalize_title(&input.title)?;
        input.execution_rules.validate(&input.cron_rules)?;

        let created = self.now();
        let next_execution = input
            .execution_rules
            .next_execution(&input.cron_rules, created)?;

        let draft = TaskDraft {
            title,
            task_type: input.task_type,
            state: TaskState::Enabled,
            cron_rules: input.cron_rules,
            execution_rules: input.execution_rules,
            params: input.params,
            next_execution,
            created,
            created_by: input.created_by,
        };

        let task = self.store.insert(draft).await?;

        tracing::info!(
            task_id = task.id,
            task_type = %task.task_type,
            next_execution = ?task.next_execution,
            "Task created"
        );
        self.notify_scheduler();

        Ok(task)
    }

    /// Applies `patch` to task `id`. The schedule is recomputed from now when
    /// the cron or execution rules change. `created` and `created_by` are
    /// kept whatever the patch says.
    pub async fn update(&self, id: i64, patch: TaskPatch) -> Result<TaskDefinition, AppError> {
        let _guard = self.locks.acquire(id).await;
        let current = self.fetch(id).await?;

        if patch.created.is_some() || patch.created_by.is_some() {
            tracing::debug!(task_id = id, "Ignoring creation metadata in task update");
        }

        let mut task = current.clone();
        if let Some(title) = patch.title {
            task.title = normalize_title(&title)?;
        }
        if let Some(task_type) = patch.task_type {
            task.task_type = task_type;
        }
        if let Some(state) = patch.state {
            task.state = state;
        }
        if let Some(cron_rules) = patch.cron_rules {
            task.cron_rules = cron_rules;
        }
        if let Some(execution_rules) = patch.execution_rules {
            task.execution_rules = execution_rules;
        }
        if let Some(params) = patch.params {
            task.params = params;
        }

        if !self.registry.contains(&task.task_type) {
            return Err(AppError::UnknownType(task.task_type));
        }
        task.execution_rules.validate(&task.cron_rules)?;

        let schedule_changed = task.cron_rules != current.cron_rules
            || task.execution_rules != current.execution_rules;
        if schedule_changed {
            task.next_execution = task
                .execution_rules
                .next_execution(&task.cron_rules, self.now())?;
        }

        self.store.update(&task).await?;

        tracing::info!(
            task_id = id,
            schedule_changed,
            state = ?task.state,
            "Task updated"
        );
        if schedule_changed || task.state != current.state {
            self.notify_scheduler();
        }

        Ok(task)
    }

    /// Moves a task between enabled, disabled and trashed. Rows are never
    /// deleted.
    pub async fn set_state(&self, id: i64, state: TaskState) -> Result<TaskDefinition, AppError> {
        self.update(
            id,
            TaskPatch {
                state: Some(state),
                ..TaskPatch::default()
            },
        )
        .await
    }

    /// Recomputes `next_execution` once a run has finished, successful or
    /// not. Manual tasks end up with no next execution.
    pub async fn recompute_next(
        &self,
        id: i64,
        after: DateTime<Utc>,
    ) -> Result<TaskDefinition, AppError> {
        let task = self.reschedule(id, after).await?;
        self.notify_scheduler();
        Ok(task)
    }

    /// Like [`recompute_next`](Self::recompute_next) but without waking the
    /// runner, which reads the next due time itself after a pass.
    pub(crate) async fn reschedule(
        &self,
        id: i64,
        after: DateTime<Utc>,
    ) -> Result<TaskDefinition, AppError> {
        let _guard = self.locks.acquire(id).await;
        let mut task = self.fetch(id).await?;

        task.next_execution = task
            .execution_rules
            .next_execution(&task.cron_rules, after)?;
        self.store.update(&task).await?;

        tracing::debug!(task_id = id, next_execution = ?task.next_execution, "Rescheduled task");

        Ok(task)
    }

    /// Enabled tasks whose `next_execution` is at or before `at`, earliest
    /// first, ties broken by id.
    pub async fn due_tasks(&self, at: DateTime<Utc>) -> Result<Vec<TaskDefinition>, AppError> {
        self.store.query(&TaskFilter::due(at)).await
    }

    /// The earliest `next_execution` among enabled tasks.
    pub async fn next_due(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let filter = TaskFilter {
            state: Some(TaskState::Enabled),
            scheduled_only: true,
            order: TaskOrder::NextExecution,
            limit: Some(1),
            ..TaskFilter::default()
        };

        let tasks = self.store.query(&filter).await?;
        Ok(tasks.first().and_then(|t| t.next_execution))
    }

    pub async fn get(&self, id: i64) -> Result<TaskDefinition, AppError> {
        self.fetch(id).await
    }

    /// Every task, trashed ones included, ordered by id.
    pub async fn list(&self) -> Result<Vec<TaskDefinition>, AppError> {
        self.store.query(&TaskFilter::default()).await
    }

    async fn fetch(&self, id: i64) -> Result<TaskDefinition, AppError> {
        self.store.get(id).await?.ok_or(AppError::NotFound(id))
    }

    // A full channel or a missing runner is not an error for the caller.
    fn notify_scheduler(&self) {
        let _ = self.scheduler_tx.try_send(());
    }
}

const HTML_ENTITIES: [(&str, &str); 6] = [
    ("&quot;", "\""),
    ("&#039;", "'"),
    ("&#39;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    // last, so "&amp;lt;" decodes to "&lt;" and not "<"
    ("&amp;", "&"),
];

/// Decodes the HTML entities form submissions carry and trims the result.
fn normalize_title(raw: &str) -> Result<String, AppError> {
    let decoded = HTML_ENTITIES
        .iter()
        .fold(raw.to_string(), |title, (entity, text)| {
            title.replace(entity, text)
        });

    let title = decoded.trim();
    if title.is_empty() {
        return Err(AppError::InvalidTitle("title must not be empty".into()));
    }

    Ok(title.to_string())
}
