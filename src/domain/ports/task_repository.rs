use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{NewTask, Task, TaskChanges, TaskFilter, TaskHandle, TaskId};

/// Repository port for task persistence.
///
/// Every method is scoped by `owner_id`: a task owned by someone else behaves
/// exactly like a task that does not exist.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task for `owner_id` and return it with its assigned id.
    async fn insert(&self, owner_id: &str, task: &NewTask) -> DomainResult<Task>;

    /// Get a task if it exists and is owned by `owner_id`.
    async fn get_owned(&self, owner_id: &str, id: TaskId) -> DomainResult<Option<Task>>;

    /// Lightweight existence and ownership check.
    async fn find_handle(&self, owner_id: &str, id: TaskId) -> DomainResult<Option<TaskHandle>>;

    /// List the owner's tasks in creation order, oldest first.
    async fn list_owned(&self, owner_id: &str, filter: TaskFilter) -> DomainResult<Vec<Task>>;

    /// Apply changes in a single transaction. `None` when not found or not owned.
    async fn update_owned(
        &self,
        owner_id: &str,
        id: TaskId,
        changes: &TaskChanges,
    ) -> DomainResult<Option<Task>>;

    /// Mark completed in a single transaction. Completing a completed task
    /// leaves it unchanged. Returns the task and whether it was already done.
    async fn complete_owned(&self, owner_id: &str, id: TaskId)
        -> DomainResult<Option<(Task, bool)>>;

    /// Delete the task and return what it was. `None` when not found or not owned.
    async fn delete_owned(&self, owner_id: &str, id: TaskId) -> DomainResult<Option<TaskHandle>>;
}
