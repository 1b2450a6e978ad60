use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Conversation, Message, MessageRole};

/// Repository port for conversations and their append-only message logs.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Persist a new conversation.
    async fn create(&self, conversation: &Conversation) -> DomainResult<()>;

    /// Get a conversation if it exists and is owned by `owner_id`.
    async fn get_owned(&self, owner_id: &str, id: Uuid) -> DomainResult<Option<Conversation>>;

    /// Append a message and bump the conversation's `updated_at`.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> DomainResult<Message>;

    /// All messages of a conversation ordered by `created_at`, ties by id.
    async fn list_messages(&self, conversation_id: Uuid) -> DomainResult<Vec<Message>>;
}
