use crate::domain::{SelectOption, TaskType};
use crate::errors::AppError;


/// Task types available to the catalog.
///
/// Filled once at startup by whatever provides routines, then wrapped in an
/// `Arc` and handed to [`TaskCatalog`](crate::service::TaskCatalog). Nothing
/// registers types after that point.
#[derive(Debug, Clone, Default)]
pub struct TaskTypeRegistry {
    // registration order
    types: Vec<TaskType>,
}

impl TaskTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(types: impl IntoIterator<Item = TaskType>) -> Result<Self, AppError> {
        let mut registry = Self::new();
        for task_type in types {
            registry.register(task_type)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, task_type: TaskType) -> Result<(), AppError> {
        if self.contains(&task_type.task_type) {
            return Err(AppError::DuplicateType(task_type.task_type));
        }

        tracing::debug!(task_type = %task_type.task_type, "Registered task type");
        self.types.push(task_type);
        Ok(())
    }

    pub fn get(&self, task_type: &str) -> Option<&TaskType> {
        self.types.iter().find(|t| t.task_type == task_type)
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.get(task_type).is_some()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered types sorted by title, ignoring case. Equal titles keep
    /// their registration order.
    pub fn list_types(&self) -> Vec<&TaskType> {
        let mut types: Vec<&TaskType> = self.types.iter().collect();
        types.sort_by_cached_key(|t| t.title.to_lowercase());
        types
    }

    /// The sorted types as choices for a task-type picker.
    pub fn options(&self) -> Vec<SelectOption> {
        self.list_types()
            .into_iter()
            .map(|t| SelectOption::new(&t.task_type, &t.title))
            .collect()
    }
}
