//! One chat turn, end to end.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::context_builder::ContextBuilder;
use super::orchestrator::Orchestrator;
use super::ownership_guard::OwnershipGuard;
use super::persistence_gateway::PersistenceGateway;
use super::response_formatter::format_reply;
use super::retry::RetryPolicy;
use super::tool_registry::ensure_owner;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConversationConfig, Message};
use crate::domain::ports::{ConversationRepository, ReasoningOracle, TaskRepository};

/// Maximum chat message length in characters.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Reply to one chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: Uuid,
}

/// Stateless chat pipeline. Nothing survives between calls except what the
/// repositories persist.
pub struct ChatService<T: TaskRepository, C: ConversationRepository> {
    gateway: PersistenceGateway<C>,
    context: ContextBuilder<C>,
    orchestrator: Orchestrator<T>,
}

impl<T: TaskRepository, C: ConversationRepository> ChatService<T, C> {
    pub fn new(
        tasks: Arc<T>,
        conversations: Arc<C>,
        oracle: Arc<dyn ReasoningOracle>,
        config: ConversationConfig,
        retry: RetryPolicy,
    ) -> Self {
        let gateway = PersistenceGateway::new(conversations);
        Self {
            context: ContextBuilder::new(gateway.clone(), config),
            orchestrator: Orchestrator::new(oracle, OwnershipGuard::new(tasks), retry),
            gateway,
        }
    }

    /// Handle one message. The user message is stored before the turn runs
    /// and the reply after it, so a crash mid-turn leaves a readable log.
    #[instrument(skip(self, message), fields(owner_id = %owner_id, conversation_id = ?conversation_id))]
    pub async fn handle_turn(
        &self,
        owner_id: &str,
        message: &str,
        conversation_id: Option<Uuid>,
    ) -> DomainResult<ChatReply> {
        ensure_owner(owner_id)?;
        validate_message(message)?;

        let context = self.context.load(owner_id, conversation_id).await?;
        self.gateway
            .record_user_message(context.conversation_id, message)
            .await?;

        let result = self.orchestrator.run_turn(&context, message).await;
        let response = format_reply(&result);

        self.gateway
            .record_assistant_reply(context.conversation_id, &response)
            .await?;
        info!(conversation_id = %context.conversation_id, "turn replied");

        Ok(ChatReply {
            response,
            conversation_id: context.conversation_id,
        })
    }

    /// Message log of one of the caller's conversations.
    pub async fn history(&self, owner_id: &str, conversation_id: Uuid) -> DomainResult<Vec<Message>> {
        ensure_owner(owner_id)?;
        self.gateway.history(owner_id, conversation_id).await
    }
}

fn validate_message(message: &str) -> DomainResult<()> {
    if message.trim().is_empty() {
        return Err(DomainError::validation("message cannot be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(DomainError::validation(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::oracles::PatternOracle;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteConversationRepository, SqliteTaskRepository,
    };
    use crate::domain::models::MessageRole;

    async fn setup_service() -> ChatService<SqliteTaskRepository, SqliteConversationRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        ChatService::new(
            Arc::new(SqliteTaskRepository::new(pool.clone())),
            Arc::new(SqliteConversationRepository::new(pool)),
            Arc::new(PatternOracle::new()),
            ConversationConfig::default(),
            RetryPolicy::once(1),
        )
    }

    #[tokio::test]
    async fn test_turn_persists_both_messages() {
        let service = setup_service().await;
        let reply = service.handle_turn("alice", "hello", None).await.unwrap();

        let messages = service.history("alice", reply.conversation_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content, reply.response);
    }

    #[tokio::test]
    async fn test_rejects_blank_and_oversized_messages() {
        let service = setup_service().await;
        let blank = service.handle_turn("alice", "   ", None).await;
        assert!(matches!(blank, Err(DomainError::ValidationFailed(_))));

        let long = "a".repeat(MAX_MESSAGE_LEN + 1);
        let result = service.handle_turn("alice", &long, None).await;
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn test_foreign_conversation_is_not_found() {
        let service = setup_service().await;
        let reply = service.handle_turn("alice", "add milk", None).await.unwrap();
        let result = service
            .handle_turn("bob", "show my tasks", Some(reply.conversation_id))
            .await;
        assert!(matches!(result, Err(DomainError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn test_ordinal_refers_to_previous_listing() {
        let service = setup_service().await;
        let first = service.handle_turn("alice", "add milk, eggs, bread", None).await.unwrap();
        let id = Some(first.conversation_id);
        service.handle_turn("alice", "show my tasks", id).await.unwrap();

        let reply = service.handle_turn("alice", "complete the second one", id).await.unwrap();
        assert!(reply.response.contains("\"eggs\""), "{}", reply.response);
    }
}
