//! In-memory task store.
//!
//! Every mutation happens inside one critical section, so a status
//! transition and the fields it sets are observed together. Reads hand out
//! clones.

use std::collections::HashMap;

use parking_lot::RwLock;
use sorawm_models::{Task, TaskId, TaskStatus, TaskView};

use crate::error::{StoreError, StoreResult};

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Task records keyed by ID. Records live for the process lifetime.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new task. IDs are never reused.
    pub fn create(&self, task: Task) -> StoreResult<()> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(StoreError::Duplicate(task.id));
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.tasks.read().get(task_id).cloned()
    }

    pub fn view(&self, task_id: &TaskId) -> Option<TaskView> {
        self.tasks.read().get(task_id).map(Task::view)
    }

    /// Raise a task's progress. Unknown tasks and regressions are ignored.
    pub fn set_progress(&self, task_id: &TaskId, progress: u8) -> bool {
        self.tasks
            .write()
            .get_mut(task_id)
            .map(|task| task.set_progress(progress))
            .unwrap_or(false)
    }

    /// Move a task to `Completed`. Returns the updated record.
    pub fn complete(&self, task_id: &TaskId, download_reference: impl Into<String>) -> StoreResult<Task> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.clone()))?;
        task.complete(download_reference)?;
        Ok(task.clone())
    }

    /// Move a task to `Failed`. Returns the updated record.
    pub fn fail(&self, task_id: &TaskId, error: impl Into<String>) -> StoreResult<Task> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.clone()))?;
        task.fail(error)?;
        Ok(task.clone())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let tasks = self.tasks.read();
        let mut counts = StatusCounts::default();
        for task in tasks.values() {
            match task.status {
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
