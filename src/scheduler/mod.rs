use std::sync::Arc;
use std::time::Duration;

use crate::domain::{TaskDefinition, TaskType};
use crate::errors::AppError;
use crate::service::TaskCatalog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;


const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Executes the routine behind a task.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &TaskDefinition) -> Result<Value, String>;
}

/// Runs `echo` tasks by returning their params.
pub struct EchoRunner;

impl EchoRunner {
    pub fn task_type() -> TaskType {
        TaskType::new("echo", "Echo parameters")
    }
}

#[async_trait]
impl TaskRunner for EchoRunner {
    async fn run(&self, task: &TaskDefinition) -> Result<Value, String> {
        Ok(json!({ "task": task.title, "params_echo": task.params }))
    }
}

/// Runs every due task, then sleeps until the next one is due, `idle` has
/// passed, or the catalog signals a schedule change.
pub async fn run_scheduler(
    catalog: TaskCatalog,
    runner: Arc<dyn TaskRunner>,
    mut rx: mpsc::Receiver<()>,
    idle: Duration,
    token: CancellationToken,
) {
    loop {
        let sleep_duration = match tick(&catalog, runner.as_ref()).await {
            Ok(Some(next)) => (next - catalog.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(idle),
            Ok(None) => idle,
            Err(e) => {
                tracing::error!("Scheduler pass failed: {:?}", e);
                ERROR_BACKOFF
            }
        };

        tracing::debug!("Scheduler sleeping for {:?}", sleep_duration);

        tokio::select! {
            // Cancellation signal received
            _ = token.cancelled() => {
                tracing::info!("Scheduler received cancellation signal. Exiting.");
                break;
            }
            _ = tokio::time::sleep(sleep_duration) => {}
            // Schedule change notification received
            _ = rx.recv() => {
                tracing::debug!("Received schedule change notification.");
            }
        }
    }
    tracing::info!("Scheduler exited cleanly!")
}

/// One pass: runs what is due now and returns when the next task is due.
async fn tick(
    catalog: &TaskCatalog,
    runner: &dyn TaskRunner,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let due = catalog.due_tasks(catalog.now()).await?;

    for task in due {
        tracing::info!(
            task_id = task.id,
            task_type = %task.task_type,
            "Running task: {}",
            task.title
        );

        match runner.run(&task).await {
            Ok(output) => tracing::info!(task_id = task.id, %output, "Task succeeded"),
            Err(e) => tracing::warn!(task_id = task.id, error = %e, "Task failed"),
        }

        catalog.reschedule(task.id, catalog.now()).await?;
    }

    catalog.next_due().await
}
