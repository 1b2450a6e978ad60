//! Rebuilds a turn's working context from persisted history.
//!
//! Everything here is derived from the message log on each call. Compaction
//! and task extraction are pure functions of the message sequence, so two
//! builds over the same history always agree.

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::persistence_gateway::PersistenceGateway;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ContextMessage, ConversationConfig, ConversationContext, Message, MessageRole, SurfacedTasks,
    TaskHandle, Turn,
};
use crate::domain::ports::ConversationRepository;

/// Longest excerpt of a message kept in a summary line.
const SUMMARY_EXCERPT_CHARS: usize = 80;
/// Most summary lines; older turns are only counted.
const SUMMARY_MAX_LINES: usize = 20;

static LIST_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:Your (?:\w+ )?tasks:|You have no (?:\w+ )?tasks\.)$").expect("static pattern compiles")
});
static LIST_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^  #(\d+) \[[ x]\] (.+)$").expect("static pattern compiles"));
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)task #(\d+) "([^"\n]*)""#).expect("static pattern compiles"));

pub struct ContextBuilder<C: ConversationRepository> {
    gateway: PersistenceGateway<C>,
    config: ConversationConfig,
}

impl<C: ConversationRepository> ContextBuilder<C> {
    pub fn new(gateway: PersistenceGateway<C>, config: ConversationConfig) -> Self {
        Self { gateway, config }
    }

    /// Load (or lazily create) the conversation and assemble its context.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn load(
        &self,
        owner_id: &str,
        conversation_id: Option<Uuid>,
    ) -> DomainResult<ConversationContext> {
        let (conversation, messages) = self.gateway.open(owner_id, conversation_id).await?;
        let context = assemble(conversation.id, owner_id, &messages, self.config);
        debug!(
            conversation_id = %context.conversation_id,
            messages = messages.len(),
            raw_turns = context.turns.len(),
            compacted = context.summary.is_some(),
            "context assembled"
        );
        Ok(context)
    }
}

/// Build a context from an ordered message log.
pub fn assemble(
    conversation_id: Uuid,
    owner_id: &str,
    messages: &[Message],
    config: ConversationConfig,
) -> ConversationContext {
    let (summary, turns) = compact(group_turns(messages), config);
    ConversationContext {
        conversation_id,
        owner_id: owner_id.to_string(),
        summary,
        turns,
        surfaced: surfaced_tasks(messages),
    }
}

/// Group messages into turns: each user message opens a new turn.
pub fn group_turns(messages: &[Message]) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    for message in messages {
        let entry = ContextMessage {
            role: message.role,
            content: message.content.clone(),
        };
        match (message.role, turns.last_mut()) {
            (MessageRole::Assistant, Some(turn)) => turn.messages.push(entry),
            _ => turns.push(Turn {
                messages: vec![entry],
            }),
        }
    }
    turns
}

/// Replace all but the most recent turns with a summary once the history is
/// longer than the threshold.
pub fn compact(turns: Vec<Turn>, config: ConversationConfig) -> (Option<String>, Vec<Turn>) {
    if turns.len() <= config.compaction_threshold {
        return (None, turns);
    }

    let keep = config.recent_turns.min(turns.len());
    let split = turns.len() - keep;
    let (older, recent) = turns.split_at(split);
    (Some(summarize(older)), recent.to_vec())
}

fn summarize(turns: &[Turn]) -> String {
    let mut lines = vec![format!("{} earlier turns.", turns.len())];
    let skipped = turns.len().saturating_sub(SUMMARY_MAX_LINES);
    if skipped > 0 {
        lines.push(format!("({skipped} oldest turns omitted)"));
    }

    for turn in &turns[skipped..] {
        let said = |role: MessageRole| {
            turn.messages
                .iter()
                .find(|m| m.role == role)
                .map(|m| excerpt(&m.content))
        };
        match (said(MessageRole::User), said(MessageRole::Assistant)) {
            (Some(user), Some(reply)) => lines.push(format!("- user: {user} | assistant: {reply}")),
            (Some(user), None) => lines.push(format!("- user: {user}")),
            (None, Some(reply)) => lines.push(format!("- assistant: {reply}")),
            (None, None) => {}
        }
    }
    lines.join("\n")
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= SUMMARY_EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(SUMMARY_EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}

/// Recover the tasks the assistant has shown, from its own replies.
pub fn surfaced_tasks(messages: &[Message]) -> SurfacedTasks {
    let mut surfaced = SurfacedTasks::default();

    for message in messages.iter().filter(|m| m.role == MessageRole::Assistant) {
        let mentions: Vec<TaskHandle> = MENTION
            .captures_iter(&message.content)
            .filter_map(|caps| handle(&caps[1], &caps[2]))
            .collect();
        let rows: Vec<TaskHandle> = LIST_ROW
            .captures_iter(&message.content)
            .filter_map(|caps| handle(&caps[1], &caps[2]))
            .collect();

        if LIST_HEADER.is_match(&message.content) {
            surfaced.listed.clone_from(&rows);
        }
        surfaced.latest = mentions.iter().chain(rows.iter()).cloned().collect();
        surfaced.mentioned.extend(mentions);
    }

    surfaced
}

fn handle(id: &str, title: &str) -> Option<TaskHandle> {
    Some(TaskHandle {
        id: id.parse().ok()?,
        title: title.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn message(id: i64, role: MessageRole, content: &str) -> Message {
        Message {
            id,
            conversation_id: Uuid::nil(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    fn conversation(turns: usize) -> Vec<Message> {
        (0..turns)
            .flat_map(|i| {
                let i = i as i64;
                [
                    message(i * 2, MessageRole::User, &format!("request {i}")),
                    message(i * 2 + 1, MessageRole::Assistant, &format!("reply {i}")),
                ]
            })
            .collect()
    }

    fn config(threshold: usize, recent: usize) -> ConversationConfig {
        ConversationConfig {
            compaction_threshold: threshold,
            recent_turns: recent,
        }
    }

    #[test]
    fn test_short_history_is_not_compacted() {
        let (summary, turns) = compact(group_turns(&conversation(3)), config(5, 2));
        assert!(summary.is_none());
        assert_eq!(turns.len(), 3);
    }

    #[test]
    fn test_long_history_keeps_recent_turns() {
        let (summary, turns) = compact(group_turns(&conversation(8)), config(5, 2));
        let summary = summary.unwrap();
        assert!(summary.starts_with("6 earlier turns."));
        assert!(summary.contains("request 0"));
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].messages[0].content, "request 6");
    }

    #[test]
    fn test_leading_assistant_message_forms_its_own_turn() {
        let messages = vec![
            message(1, MessageRole::Assistant, "welcome"),
            message(2, MessageRole::User, "hi"),
            message(3, MessageRole::Assistant, "hello"),
        ];
        let turns = group_turns(&messages);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].messages.len(), 2);
    }

    #[test]
    fn test_surfaced_tasks_from_replies() {
        let messages = vec![
            message(1, MessageRole::User, "show my tasks"),
            message(
                2,
                MessageRole::Assistant,
                "Your tasks:\n  #4 [ ] buy milk\n  #7 [x] call mom",
            ),
            message(3, MessageRole::User, "add eggs"),
            message(4, MessageRole::Assistant, "Added task #9 \"eggs\"."),
        ];

        let surfaced = surfaced_tasks(&messages);
        assert_eq!(surfaced.listed.iter().map(|h| h.id).collect::<Vec<_>>(), vec![4, 7]);
        assert_eq!(surfaced.listed[1].title, "call mom");
        assert_eq!(surfaced.latest_single().map(|h| h.id), Some(9));
        assert_eq!(surfaced.mentioned.len(), 1);
    }

    #[test]
    fn test_description_lines_are_not_rows() {
        let messages = vec![message(
            1,
            MessageRole::Assistant,
            "Your tasks:\n  #1 [ ] milk\n      - #99 [ ] note\n      #98 [ ] older note\n  #2 [ ] eggs",
        )];
        let surfaced = surfaced_tasks(&messages);
        assert_eq!(surfaced.listed.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(surfaced.listed[1].title, "eggs");
    }

    #[test]
    fn test_empty_listing_clears_rows() {
        let messages = vec![
            message(1, MessageRole::Assistant, "Your tasks:\n  #4 [ ] buy milk"),
            message(2, MessageRole::Assistant, "You have no pending tasks."),
        ];
        let surfaced = surfaced_tasks(&messages);
        assert!(surfaced.listed.is_empty());
        assert!(surfaced.latest.is_empty());
    }

    proptest! {
        #[test]
        fn prop_compaction_is_deterministic(turns in 0usize..40, threshold in 1usize..20, recent in 0usize..20) {
            let recent = recent.min(threshold);
            let messages = conversation(turns);
            let first = compact(group_turns(&messages), config(threshold, recent));
            let second = compact(group_turns(&messages), config(threshold, recent));
            prop_assert_eq!(&first, &second);

            let (summary, kept) = first;
            if turns > threshold {
                prop_assert!(summary.is_some());
                prop_assert_eq!(kept.len(), recent);
            } else {
                prop_assert!(summary.is_none());
                prop_assert_eq!(kept.len(), turns);
            }
        }
    }
}
