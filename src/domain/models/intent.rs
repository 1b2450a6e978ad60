//! Intent models.
//!
//! A reasoning oracle proposes [`IntentProposal`]s from raw text. The intent
//! resolver turns each proposal into a [`ResolvedIntent`] by binding task
//! references against the conversation context. Neither is ever persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::task::{TaskFilter, TaskId};
use super::tool::ClarificationNeed;

/// The fixed operation set, plus `None` for messages that need no tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    List,
    Update,
    Complete,
    Delete,
    None,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Update => "update",
            Self::Complete => "complete",
            Self::Delete => "delete",
            Self::None => "none",
        }
    }

    /// Whether the operation needs an existing task to act on.
    pub fn requires_target(&self) -> bool {
        matches!(self, Self::Update | Self::Complete | Self::Delete)
    }

    /// Whether a successful call yields a single task later steps can chain on.
    pub fn yields_task(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Complete)
    }
}

/// How a user pointed at a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskReference {
    /// "task 3", "#3"
    Id(TaskId),
    /// "the second one" (1-based position in the last listing)
    Ordinal(usize),
    /// "the last one"
    Last,
    /// "it", "that"
    Pronoun,
    /// "complete buy milk"
    Title(String),
}

/// Messages that need no tool at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallTalk {
    Greeting,
    Help,
    Unclear,
}

/// Raw interpretation of one clause, as produced by a reasoning oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentProposal {
    pub operation: Operation,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub target: Option<TaskReference>,
    #[serde(default)]
    pub filter: Option<TaskFilter>,
    /// Set when the clause acts on the result of the previous clause
    /// ("add milk and complete it").
    #[serde(default)]
    pub chained: bool,
    #[serde(default)]
    pub small_talk: Option<SmallTalk>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

impl IntentProposal {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            title: None,
            description: None,
            target: None,
            filter: None,
            chained: false,
            small_talk: None,
            confidence: default_confidence(),
        }
    }

    pub fn small_talk(kind: SmallTalk, confidence: f32) -> Self {
        Self {
            small_talk: Some(kind),
            confidence,
            ..Self::new(Operation::None)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_target(mut self, target: TaskReference) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_filter(mut self, filter: TaskFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn chained(mut self) -> Self {
        self.chained = true;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// A required parameter the resolver could not extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentField {
    Title,
    Target,
    /// New title or description for an update.
    Changes,
}

/// A task the intent acts on, once bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTarget {
    Task(TaskId),
    /// Whatever task the previous intent in the same turn produces.
    PreviousResult,
}

/// Parameters of a resolved intent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target: Option<IntentTarget>,
    pub filter: TaskFilter,
}

/// One operation the user asked for, bound against the conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIntent {
    pub operation: Operation,
    pub params: IntentParams,
    pub confidence: f32,
    pub ambiguous: bool,
    pub missing_fields: BTreeSet<IntentField>,
    pub small_talk: Option<SmallTalk>,
    /// The question to ask when the intent is ambiguous.
    pub clarification: Option<ClarificationNeed>,
}

impl ResolvedIntent {
    /// Whether this intent depends on the previous intent's result.
    pub fn is_chained(&self) -> bool {
        self.params.target == Some(IntentTarget::PreviousResult)
    }
}
