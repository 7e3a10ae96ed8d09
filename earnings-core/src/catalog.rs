//! Task catalog port
//!
//! The catalog is owned by the content side of the app. The ledger only
//! resolves task ids to their pricing at submission time.

use crate::types::TaskDefinition;
use dashmap::DashMap;

/// Read-only task lookup
pub trait TaskCatalog: Send + Sync {
    /// Resolve a task id
    fn resolve_task(&self, task_id: &str) -> Option<TaskDefinition>;
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tasks: DashMap<String, TaskDefinition>,
}

impl InMemoryCatalog {
    /// Create empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of definitions
    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskDefinition>) -> Self {
        let catalog = Self::new();
        for task in tasks {
            catalog.upsert(task);
        }
        catalog
    }

    /// Insert or replace a definition
    pub fn upsert(&self, task: TaskDefinition) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no task is defined
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskCatalog for InMemoryCatalog {
    fn resolve_task(&self, task_id: &str) -> Option<TaskDefinition> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }
}
