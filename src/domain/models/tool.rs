//! Tool calls and their outcomes.
//!
//! [`ToolCall`] is the closed set of operations the reasoning side may
//! request. It is the only shape in which task storage can be reached.

use serde::{Deserialize, Serialize};

use super::intent::{Operation, SmallTalk};
use super::task::{Task, TaskFilter, TaskHandle, TaskId};
use crate::domain::errors::ErrorKind;

/// One of the five registry operations with its fixed parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    Create {
        title: String,
        #[serde(default)]
        description: Option<String>,
    },
    List {
        #[serde(default)]
        filter: TaskFilter,
    },
    Update {
        task_id: TaskId,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    Complete {
        task_id: TaskId,
    },
    Delete {
        task_id: TaskId,
    },
}

impl ToolCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Create { .. } => Operation::Create,
            Self::List { .. } => Operation::List,
            Self::Update { .. } => Operation::Update,
            Self::Complete { .. } => Operation::Complete,
            Self::Delete { .. } => Operation::Delete,
        }
    }

    /// The existing task this call acts on, if any.
    pub fn target(&self) -> Option<TaskId> {
        match self {
            Self::Create { .. } | Self::List { .. } => None,
            Self::Update { task_id, .. } | Self::Complete { task_id } | Self::Delete { task_id } => {
                Some(*task_id)
            }
        }
    }
}

/// Successful result of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ToolResult {
    Created { task: Task },
    Listed { filter: TaskFilter, tasks: Vec<Task> },
    Updated { task: Task },
    Completed { task: Task, already_completed: bool },
    Deleted { task: TaskHandle },
}

impl ToolResult {
    /// The single task this result produced, for chained intents.
    pub fn produced_task(&self) -> Option<TaskId> {
        match self {
            Self::Created { task } | Self::Updated { task } | Self::Completed { task, .. } => {
                Some(task.id)
            }
            Self::Listed { .. } | Self::Deleted { .. } => None,
        }
    }
}

/// Why a step was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The step needed the result of an earlier step that failed or was skipped.
    DependencyFailed,
    /// The turn ended early to ask the user which task they meant.
    AwaitingClarification,
}

/// Terminal state of one orchestrated step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded { result: ToolResult },
    Failed {
        kind: ErrorKind,
        /// Plain-language detail, only kept for validation failures.
        detail: Option<String>,
    },
    Skipped { reason: SkipReason },
}

/// Outcome of one step in a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub operation: Operation,
    pub target: Option<TaskId>,
    pub status: OutcomeStatus,
    pub retried: bool,
}

impl ToolCallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }

    pub fn skipped(operation: Operation, reason: SkipReason) -> Self {
        Self {
            operation,
            target: None,
            status: OutcomeStatus::Skipped { reason },
            retried: false,
        }
    }
}

/// What the user must tell us before anything can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "need", rename_all = "snake_case")]
pub enum ClarificationNeed {
    MissingTitle,
    MissingTarget { operation: Operation },
    MissingChanges { task_id: Option<TaskId> },
    TitleNotMatched { operation: Operation, title: String },
    AmbiguousTitle { operation: Operation, title: String },
    TaskNotFound { task_id: TaskId },
    Unclear,
}

/// Everything the formatter needs to write one reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "turn", rename_all = "snake_case")]
pub enum TurnResult {
    /// Steps ran; `follow_up` is set when recovery ended the turn early.
    Executed {
        outcomes: Vec<ToolCallOutcome>,
        follow_up: Option<ClarificationNeed>,
    },
    ClarificationNeeded { need: ClarificationNeed },
    SmallTalk { kind: SmallTalk },
    ReasoningUnavailable,
}
