use thiserror::Error;

use crate::cron::CronField;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid cron rule for {field}: {reason}")]
    InvalidRuleSet { field: CronField, reason: String },

    #[error("Invalid cron expression: {0}")]
    InvalidCronExpression(String),

    #[error("No execution time matches the cron rules within {years} years")]
    Unsatisfiable { years: i32 },

    #[error("Unknown task type '{0}'")]
    UnknownType(String),

    #[error("Invalid title: {0}")]
    InvalidTitle(String),

    #[error("Invalid execution rules: {0}")]
    InvalidExecutionRules(String),

    #[error("Task type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Task {0} not found")]
    NotFound(i64),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl AppError {
    pub(crate) fn invalid_rule(field: CronField, reason: impl Into<String>) -> Self {
        AppError::InvalidRuleSet {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the input field a validation error refers to, so a form layer
    /// can highlight it. `None` for errors that are not about user input.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AppError::InvalidRuleSet { field, .. } => Some(field.form_name()),
            AppError::InvalidCronExpression(_) | AppError::Unsatisfiable { .. } => {
                Some("cron_rules")
            }
            AppError::UnknownType(_) => Some("type"),
            AppError::InvalidTitle(_) => Some("title"),
            AppError::InvalidExecutionRules(_) => Some("execution_rules"),
            AppError::DuplicateType(_)
            | AppError::StoreUnavailable(_)
            | AppError::NotFound(_)
            | AppError::Config(_) => None,
        }
    }
}
