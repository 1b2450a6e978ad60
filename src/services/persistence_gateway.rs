//! The single reader and writer of conversation storage.

use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Conversation, Message, MessageRole};
use crate::domain::ports::ConversationRepository;

/// Append-only access to conversations. Nothing else touches the message log.
pub struct PersistenceGateway<C: ConversationRepository> {
    repo: Arc<C>,
}

impl<C: ConversationRepository> Clone for PersistenceGateway<C> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<C: ConversationRepository> PersistenceGateway<C> {
    pub fn new(repo: Arc<C>) -> Self {
        Self { repo }
    }

    /// Open the conversation a turn continues, or start a new one.
    ///
    /// A conversation owned by someone else is reported exactly like a
    /// missing one.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn open(
        &self,
        owner_id: &str,
        conversation_id: Option<Uuid>,
    ) -> DomainResult<(Conversation, Vec<Message>)> {
        match conversation_id {
            None => {
                let conversation = Conversation::new(owner_id);
                self.repo.create(&conversation).await?;
                debug!(conversation_id = %conversation.id, "started conversation");
                Ok((conversation, Vec::new()))
            }
            Some(id) => {
                let conversation = self.owned(owner_id, id).await?;
                let messages = self.repo.list_messages(id).await?;
                Ok((conversation, messages))
            }
        }
    }

    /// Ordered message log of an owned conversation.
    pub async fn history(&self, owner_id: &str, conversation_id: Uuid) -> DomainResult<Vec<Message>> {
        self.owned(owner_id, conversation_id).await?;
        self.repo.list_messages(conversation_id).await
    }

    pub async fn record_user_message(&self, conversation_id: Uuid, content: &str) -> DomainResult<Message> {
        self.repo
            .append_message(conversation_id, MessageRole::User, content)
            .await
    }

    pub async fn record_assistant_reply(&self, conversation_id: Uuid, content: &str) -> DomainResult<Message> {
        self.repo
            .append_message(conversation_id, MessageRole::Assistant, content)
            .await
    }

    async fn owned(&self, owner_id: &str, conversation_id: Uuid) -> DomainResult<Conversation> {
        self.repo
            .get_owned(owner_id, conversation_id)
            .await?
            .ok_or_else(|| DomainError::ConversationNotFound(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteConversationRepository};

    async fn setup_gateway() -> PersistenceGateway<SqliteConversationRepository> {
        let pool = create_migrated_test_pool().await.unwrap();
        PersistenceGateway::new(Arc::new(SqliteConversationRepository::new(pool)))
    }

    #[tokio::test]
    async fn test_open_without_id_starts_empty_conversation() {
        let gateway = setup_gateway().await;
        let (conversation, messages) = gateway.open("alice", None).await.unwrap();
        assert_eq!(conversation.owner_id, "alice");
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_conversation_is_not_found() {
        let gateway = setup_gateway().await;
        let (conversation, _) = gateway.open("alice", None).await.unwrap();
        gateway.record_user_message(conversation.id, "add milk").await.unwrap();

        let result = gateway.open("bob", Some(conversation.id)).await;
        assert!(matches!(result, Err(DomainError::ConversationNotFound(_))));
        let result = gateway.history("bob", conversation.id).await;
        assert!(matches!(result, Err(DomainError::ConversationNotFound(_))));
    }

    #[tokio::test]
    async fn test_user_message_precedes_reply() {
        let gateway = setup_gateway().await;
        let (conversation, _) = gateway.open("alice", None).await.unwrap();
        gateway.record_user_message(conversation.id, "hi").await.unwrap();
        gateway.record_assistant_reply(conversation.id, "hello").await.unwrap();

        let (_, messages) = gateway.open("alice", Some(conversation.id)).await.unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }
}
