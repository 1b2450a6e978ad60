//! SQLite implementation of the TaskRepository.
//!
//! Every statement filters on `owner_id`, so ownership is re-derived from the
//! stored row regardless of what the caller checked beforehand.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{NewTask, Task, TaskChanges, TaskFilter, TaskHandle, TaskId};
use crate::domain::ports::TaskRepository;

const TASK_COLUMNS: &str = "id, owner_id, title, description, completed, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert(&self, owner_id: &str, task: &NewTask) -> DomainResult<Task> {
        let now = format_datetime(Utc::now());

        let row: TaskRow = sqlx::query_as(&format!(
            "INSERT INTO tasks (owner_id, title, description, completed, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(owner_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_owned(&self, owner_id: &str, id: TaskId) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_handle(&self, owner_id: &str, id: TaskId) -> DomainResult<Option<TaskHandle>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, title FROM tasks WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, title)| TaskHandle { id, title }))
    }

    async fn list_owned(&self, owner_id: &str, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let status_clause = match filter {
            TaskFilter::All => "",
            TaskFilter::Pending => " AND completed = 0",
            TaskFilter::Completed => " AND completed = 1",
        };

        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?{status_clause}
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_owned(
        &self,
        owner_id: &str,
        id: TaskId,
        changes: &TaskChanges,
    ) -> DomainResult<Option<Task>> {
        let now = format_datetime(Utc::now());
        let (set_description, description) = match &changes.description {
            Some(description) => (true, description.clone()),
            None => (false, None),
        };

        // Single statement, so the update is all-or-nothing.
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            "UPDATE tasks SET
                title = COALESCE(?, title),
                description = CASE WHEN ? THEN ? ELSE description END,
                updated_at = ?
             WHERE id = ? AND owner_id = ?
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(&changes.title)
        .bind(set_description)
        .bind(description)
        .bind(&now)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn complete_owned(
        &self,
        owner_id: &str,
        id: TaskId,
    ) -> DomainResult<Option<(Task, bool)>> {
        let mut tx = self.pool.begin().await?;

        let current: Option<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND owner_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };

        if current.completed {
            tx.commit().await?;
            return Ok(Some((current.try_into()?, true)));
        }

        let row: TaskRow = sqlx::query_as(&format!(
            "UPDATE tasks SET completed = 1, updated_at = ?
             WHERE id = ? AND owner_id = ?
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(format_datetime(Utc::now()))
        .bind(id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((row.try_into()?, false)))
    }

    async fn delete_owned(&self, owner_id: &str, id: TaskId) -> DomainResult<Option<TaskHandle>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("DELETE FROM tasks WHERE id = ? AND owner_id = ? RETURNING id, title")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, title)| TaskHandle { id, title }))
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    owner_id: String,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
