//! Common test utilities for integration tests
//!
//! Shared fixtures for building the chat pipeline over a fresh in-memory
//! database.

#![allow(dead_code)]

use std::sync::Arc;

use chatdo::adapters::oracles::PatternOracle;
use chatdo::adapters::sqlite::{
    create_migrated_test_pool, SqliteConversationRepository, SqliteTaskRepository,
};
use chatdo::domain::models::ConversationConfig;
use chatdo::domain::ports::ReasoningOracle;
use chatdo::services::{ChatReply, ChatService, OwnershipGuard, RetryPolicy};
use uuid::Uuid;

pub type TestChatService = ChatService<SqliteTaskRepository, SqliteConversationRepository>;

/// Everything a test needs to drive turns and inspect storage.
pub struct Harness {
    pub chat: TestChatService,
    pub guard: OwnershipGuard<SqliteTaskRepository>,
    pub tasks: Arc<SqliteTaskRepository>,
}

impl Harness {
    /// Send a message and return the reply.
    pub async fn say(&self, user: &str, message: &str, conversation: Option<Uuid>) -> ChatReply {
        self.chat
            .handle_turn(user, message, conversation)
            .await
            .expect("chat turn should succeed")
    }
}

/// Pipeline with the pattern oracle and default conversation settings.
pub async fn harness() -> Harness {
    harness_with(Arc::new(PatternOracle::new()), ConversationConfig::default()).await
}

pub async fn harness_with(oracle: Arc<dyn ReasoningOracle>, config: ConversationConfig) -> Harness {
    let pool = create_migrated_test_pool()
        .await
        .expect("Failed to create test database");
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let conversations = Arc::new(SqliteConversationRepository::new(pool));

    Harness {
        chat: ChatService::new(
            Arc::clone(&tasks),
            conversations,
            oracle,
            config,
            RetryPolicy::once(1),
        ),
        guard: OwnershipGuard::new(Arc::clone(&tasks)),
        tasks,
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
