//! SQLite implementation of the ConversationRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Conversation, Message, MessageRole};
use crate::domain::ports::ConversationRepository;

#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: SqlitePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for SqliteConversationRepository {
    async fn create(&self, conversation: &Conversation) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO conversations (id, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation.id.to_string())
        .bind(&conversation.owner_id)
        .bind(format_datetime(conversation.created_at))
        .bind(format_datetime(conversation.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_owned(&self, owner_id: &str, id: Uuid) -> DomainResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            "SELECT id, owner_id, created_at, updated_at FROM conversations
             WHERE id = ? AND owner_id = ?",
        )
        .bind(id.to_string())
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> DomainResult<Message> {
        let now = format_datetime(Utc::now());
        let mut tx = self.pool.begin().await?;

        // Never stamp a message earlier than the newest one already logged.
        let row: MessageRow = sqlx::query_as(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, MAX(?4, COALESCE(
                 (SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1), '')))
             RETURNING id, conversation_id, role, content, created_at",
        )
        .bind(conversation_id.to_string())
        .bind(role.as_str())
        .bind(content)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(&row.created_at)
            .bind(conversation_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn list_messages(&self, conversation_id: Uuid) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id, conversation_id, role, content, created_at FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    owner_id: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = DomainError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        Ok(Conversation {
            id: parse_uuid(&row.id)?,
            owner_id: row.owner_id,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: i64,
    conversation_id: String,
    role: String,
    content: String,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = DomainError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let role = MessageRole::from_str(&row.role)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid role: {}", row.role)))?;

        Ok(Message {
            id: row.id,
            conversation_id: parse_uuid(&row.conversation_id)?,
            role,
            content: row.content,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
