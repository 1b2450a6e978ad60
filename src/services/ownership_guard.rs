//! Ownership pre-check in front of the tool registry.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::tool_registry::{ensure_owner, ToolRegistry};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskId, ToolCall, ToolResult};
use crate::domain::ports::TaskRepository;

/// Confirms that a call's target exists and belongs to the caller before the
/// registry runs it.
///
/// A foreign task and a missing task both come back as `TaskNotFound`, so a
/// caller cannot probe which ids exist.
pub struct OwnershipGuard<T: TaskRepository> {
    repo: Arc<T>,
    registry: ToolRegistry<T>,
}

impl<T: TaskRepository> Clone for OwnershipGuard<T> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            registry: self.registry.clone(),
        }
    }
}

impl<T: TaskRepository> OwnershipGuard<T> {
    pub fn new(repo: Arc<T>) -> Self {
        Self {
            registry: ToolRegistry::new(Arc::clone(&repo)),
            repo,
        }
    }

    #[instrument(skip_all, fields(owner_id = %owner_id, tool = call.operation().as_str()))]
    pub async fn execute(&self, owner_id: &str, call: &ToolCall) -> DomainResult<ToolResult> {
        ensure_owner(owner_id)?;

        if let Some(task_id) = call.target() {
            self.check(owner_id, task_id).await?;
        }

        self.registry.dispatch(owner_id, call).await
    }

    /// Read a single owned task.
    pub async fn fetch(&self, owner_id: &str, task_id: TaskId) -> DomainResult<Task> {
        ensure_owner(owner_id)?;
        self.repo
            .get_owned(owner_id, task_id)
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))
    }

    async fn check(&self, owner_id: &str, task_id: TaskId) -> DomainResult<()> {
        if self.repo.find_handle(owner_id, task_id).await?.is_none() {
            debug!(task_id, "target absent or not owned");
            return Err(DomainError::TaskNotFound(task_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteTaskRepository};
    use crate::domain::models::TaskFilter;

    async fn setup_guard() -> OwnershipGuard<SqliteTaskRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        OwnershipGuard::new(Arc::new(SqliteTaskRepository::new(pool)))
    }

    #[tokio::test]
    async fn test_foreign_and_missing_targets_look_the_same() {
        let guard = setup_guard().await;
        let created = guard
            .execute(
                "alice",
                &ToolCall::Create {
                    title: "secret".into(),
                    description: None,
                },
            )
            .await
            .unwrap();
        let ToolResult::Created { task } = created else {
            panic!("expected Created");
        };

        for call in [
            ToolCall::Complete { task_id: task.id },
            ToolCall::Delete { task_id: task.id },
            ToolCall::Update {
                task_id: task.id,
                title: Some("x".into()),
                description: None,
            },
        ] {
            let foreign = guard.execute("bob", &call).await;
            assert!(matches!(foreign, Err(DomainError::TaskNotFound(_))));
        }

        let missing = guard.execute("bob", &ToolCall::Delete { task_id: 9999 }).await;
        assert!(matches!(missing, Err(DomainError::TaskNotFound(9999))));

        let tasks = guard
            .execute("alice", &ToolCall::List { filter: TaskFilter::All })
            .await
            .unwrap();
        assert!(matches!(tasks, ToolResult::Listed { ref tasks, .. } if tasks.len() == 1 && !tasks[0].completed));
    }

    #[tokio::test]
    async fn test_fetch_is_owner_scoped() {
        let guard = setup_guard().await;
        let ToolResult::Created { task } = guard
            .execute(
                "alice",
                &ToolCall::Create {
                    title: "milk".into(),
                    description: None,
                },
            )
            .await
            .unwrap()
        else {
            panic!("expected Created");
        };

        assert_eq!(guard.fetch("alice", task.id).await.unwrap().title, "milk");
        assert!(matches!(
            guard.fetch("bob", task.id).await,
            Err(DomainError::TaskNotFound(_))
        ));
    }
}
