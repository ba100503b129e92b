use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::Type;

use crate::cron::CronRuleSet;
use crate::errors::AppError;

/// Arguments handed to a task's routine when it runs.
pub type Params = Map<String, Value>;

// Enums

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum TaskState {
    Trashed = -2,
    Disabled = 0,
    #[default]
    Enabled = 1,
}

/// How a task's next execution is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExecutionRules {
    /// Follow the task's cron rules.
    Cron,
    /// Every `minutes` minutes after the previous reference time.
    Interval { minutes: u32 },
    /// Only ever run on demand.
    Manual,
}

impl ExecutionRules {
    pub fn validate(&self, cron_rules: &CronRuleSet) -> Result<(), AppError> {
        match self {
            ExecutionRules::Cron => cron_rules.validate(),
            ExecutionRules::Interval { minutes: 0 } => Err(AppError::InvalidExecutionRules(
                "interval must be at least one minute".into(),
            )),
            ExecutionRules::Interval { .. } | ExecutionRules::Manual => Ok(()),
        }
    }

    /// The first execution strictly after `after`, or `None` for manual tasks.
    pub fn next_execution(
        &self,
        cron_rules: &CronRuleSet,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        match self {
            ExecutionRules::Manual => Ok(None),
            ExecutionRules::Cron => cron_rules.next_after(after).map(Some),
            ExecutionRules::Interval { minutes: 0 } => Err(AppError::InvalidExecutionRules(
                "interval must be at least one minute".into(),
            )),
            ExecutionRules::Interval { minutes } => {
                let seconds = after.timestamp();
                let aligned = seconds - seconds.rem_euclid(60);
                DateTime::from_timestamp(aligned + i64::from(*minutes) * 60, 0)
                    .map(Some)
                    .ok_or_else(|| {
                        AppError::InvalidExecutionRules("interval is out of range".into())
                    })
            }
        }
    }
}

// Structs

/// A `(value, label)` pair for a form's select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A kind of routine tasks can be created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskType {
    #[serde(rename = "type")]
    pub task_type: String,
    pub title: String,
}

impl TaskType {
    pub fn new(task_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub state: TaskState,
    pub cron_rules: CronRuleSet,
    pub execution_rules: ExecutionRules,
    pub params: Params,
    pub next_execution: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub created_by: i64,
}

/// A validated task that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub task_type: String,
    pub state: TaskState,
    pub cron_rules: CronRuleSet,
    pub execution_rules: ExecutionRules,
    pub params: Params,
    pub next_execution: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub created_by: i64,
}

impl TaskDraft {
    pub fn into_task(self, id: i64) -> TaskDefinition {
        TaskDefinition {
            id,
            title: self.title,
            task_type: self.task_type,
            state: self.state,
            cron_rules: self.cron_rules,
            execution_rules: self.execution_rules,
            params: self.params,
            next_execution: self.next_execution,
            created: self.created,
            created_by: self.created_by,
        }
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub cron_rules: CronRuleSet,
    pub execution_rules: ExecutionRules,
    #[serde(default)]
    pub params: Params,
    pub created_by: i64,
}

/// Partial update of a task. Absent fields are left untouched.
///
/// `created` and `created_by` are accepted so form submissions deserialize
/// cleanly, but they are never applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub state: Option<TaskState>,
    pub cron_rules: Option<CronRuleSet>,
    pub execution_rules: Option<ExecutionRules>,
    pub params: Option<Params>,
    pub created: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
}
