//! Per-turn conversation context.
//!
//! Rebuilt from persisted messages on every request and dropped at the end of
//! the turn. Nothing here is cached between requests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::MessageRole;
use super::task::TaskHandle;

/// One persisted message as the reasoning side sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: MessageRole,
    pub content: String,
}

/// A user message followed by the assistant replies to it.
///
/// Assistant messages that precede any user message form a turn of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub messages: Vec<ContextMessage>,
}

/// Tasks the assistant has shown the user, recovered from its own replies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacedTasks {
    /// Rows of the most recent listing, in display order.
    pub listed: Vec<TaskHandle>,
    /// Tasks named in the most recent assistant reply, rows included.
    pub latest: Vec<TaskHandle>,
    /// Single tasks named in confirmations across the whole history, oldest first.
    pub mentioned: Vec<TaskHandle>,
}

impl SurfacedTasks {
    /// The one task the latest reply was about, if it was about exactly one.
    pub fn latest_single(&self) -> Option<&TaskHandle> {
        let first = self.latest.first()?;
        self.latest.iter().all(|h| h.id == first.id).then_some(first)
    }

    /// Every surfaced task, most recent mention first, without duplicate ids.
    pub fn all(&self) -> Vec<&TaskHandle> {
        let mut seen = std::collections::HashSet::new();
        self.mentioned
            .iter()
            .rev()
            .chain(self.listed.iter())
            .filter(|handle| seen.insert(handle.id))
            .collect()
    }
}

/// Working context for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: Uuid,
    pub owner_id: String,
    /// Deterministic digest of turns older than the raw window.
    pub summary: Option<String>,
    /// Most recent raw turns, oldest first.
    pub turns: Vec<Turn>,
    pub surfaced: SurfacedTasks,
}

impl ConversationContext {
    /// Context of a conversation with no history yet.
    pub fn empty(conversation_id: Uuid, owner_id: impl Into<String>) -> Self {
        Self {
            conversation_id,
            owner_id: owner_id.into(),
            summary: None,
            turns: Vec::new(),
            surfaced: SurfacedTasks::default(),
        }
    }
}
