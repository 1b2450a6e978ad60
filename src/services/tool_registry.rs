//! The five task tools.
//!
//! This is the only code path from the reasoning side to task storage. Each
//! tool takes the authenticated owner first and re-derives ownership from the
//! stored row, independently of any check done by the caller.

use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    NewTask, Task, TaskChanges, TaskFilter, TaskHandle, TaskId, ToolCall, ToolResult,
};
use crate::domain::ports::TaskRepository;

/// Reject a blank owner before any storage access.
pub fn ensure_owner(owner_id: &str) -> DomainResult<()> {
    if owner_id.trim().is_empty() {
        return Err(DomainError::validation("owner_id is required"));
    }
    Ok(())
}

pub struct ToolRegistry<T: TaskRepository> {
    repo: Arc<T>,
}

impl<T: TaskRepository> Clone for ToolRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<T: TaskRepository> ToolRegistry<T> {
    pub fn new(repo: Arc<T>) -> Self {
        Self { repo }
    }

    /// Run one tool call. The match is exhaustive over the closed tool set.
    pub async fn dispatch(&self, owner_id: &str, call: &ToolCall) -> DomainResult<ToolResult> {
        ensure_owner(owner_id)?;
        debug!(owner_id, tool = call.operation().as_str(), "dispatching tool");

        match call {
            ToolCall::Create { title, description } => self
                .create(owner_id, title, description.as_deref())
                .await
                .map(|task| ToolResult::Created { task }),
            ToolCall::List { filter } => self
                .list(owner_id, *filter)
                .await
                .map(|tasks| ToolResult::Listed {
                    filter: *filter,
                    tasks,
                }),
            ToolCall::Update {
                task_id,
                title,
                description,
            } => self
                .update(owner_id, *task_id, title.as_deref(), description.as_deref())
                .await
                .map(|task| ToolResult::Updated { task }),
            ToolCall::Complete { task_id } => self
                .complete(owner_id, *task_id)
                .await
                .map(|(task, already_completed)| ToolResult::Completed {
                    task,
                    already_completed,
                }),
            ToolCall::Delete { task_id } => self
                .delete(owner_id, *task_id)
                .await
                .map(|task| ToolResult::Deleted { task }),
        }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> DomainResult<Task> {
        ensure_owner(owner_id)?;
        let new_task = NewTask::new(title, description).map_err(DomainError::ValidationFailed)?;
        self.repo.insert(owner_id, &new_task).await
    }

    pub async fn list(&self, owner_id: &str, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        ensure_owner(owner_id)?;
        self.repo.list_owned(owner_id, filter).await
    }

    pub async fn update(
        &self,
        owner_id: &str,
        task_id: TaskId,
        title: Option<&str>,
        description: Option<&str>,
    ) -> DomainResult<Task> {
        ensure_owner(owner_id)?;
        let changes = TaskChanges::new(title, description).map_err(DomainError::ValidationFailed)?;
        self.repo
            .update_owned(owner_id, task_id, &changes)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// Idempotent: completing a completed task returns it unchanged.
    pub async fn complete(&self, owner_id: &str, task_id: TaskId) -> DomainResult<(Task, bool)> {
        ensure_owner(owner_id)?;
        self.repo
            .complete_owned(owner_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    /// A second delete of the same id is `TaskNotFound`.
    pub async fn delete(&self, owner_id: &str, task_id: TaskId) -> DomainResult<TaskHandle> {
        ensure_owner(owner_id)?;
        self.repo
            .delete_owned(owner_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }
}
