//! Task domain model.
//!
//! Tasks are the only durable data users manipulate through chat. Each task
//! belongs to exactly one owner for its whole lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage identifier of a task. Users refer to it as "task 3" or "#3".
pub type TaskId = i64;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// A single to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Id and title of a task, enough to confirm ownership and name it in a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: TaskId,
    pub title: String,
}

/// Status filter for listing tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "pending" | "open" | "incomplete" => Some(Self::Pending),
            "completed" | "complete" | "done" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Validated input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
}

impl NewTask {
    /// Trim and validate a title plus optional description.
    pub fn new(title: &str, description: Option<&str>) -> Result<Self, String> {
        Ok(Self {
            title: validate_title(title)?,
            description: normalize_description(description)?,
        })
    }
}

/// Validated partial update for an existing task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

impl TaskChanges {
    /// At least one field must be present.
    pub fn new(title: Option<&str>, description: Option<&str>) -> Result<Self, String> {
        if title.is_none() && description.is_none() {
            return Err("at least one of title or description must be provided".to_string());
        }

        Ok(Self {
            title: title.map(validate_title).transpose()?,
            description: description
                .map(|d| normalize_description(Some(d)))
                .transpose()?,
        })
    }
}

fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("task title cannot be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("task title must be at most {MAX_TITLE_LEN} characters"));
    }
    Ok(title.to_string())
}

fn normalize_description(description: Option<&str>) -> Result<Option<String>, String> {
    match description.map(str::trim) {
        None | Some("") => Ok(None),
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(format!(
            "task description must be at most {MAX_DESCRIPTION_LEN} characters"
        )),
        Some(d) => Ok(Some(d.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_trims_title() {
        let task = NewTask::new("  buy milk ", Some("  ")).unwrap();
        assert_eq!(task.title, "buy milk");
        assert_eq!(task.description, None);
    }

    #[test]
    fn test_new_task_rejects_blank_title() {
        assert!(NewTask::new("   ", None).is_err());
    }

    #[test]
    fn test_title_length_limit() {
        let long = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(NewTask::new(&long, None).is_err());
        assert!(NewTask::new(&long[..MAX_TITLE_LEN], None).is_ok());
    }

    #[test]
    fn test_changes_require_a_field() {
        assert!(TaskChanges::new(None, None).is_err());
        let changes = TaskChanges::new(None, Some("")).unwrap();
        assert_eq!(changes.description, Some(None));
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!(TaskFilter::from_str("Pending"), Some(TaskFilter::Pending));
        assert_eq!(TaskFilter::from_str("done"), Some(TaskFilter::Completed));
        assert_eq!(TaskFilter::from_str("someday"), None);
    }
}
