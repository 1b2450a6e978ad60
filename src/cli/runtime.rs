//! Wiring shared by the commands: config, database and services.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::oracles::build_oracle;
use crate::adapters::sqlite::{
    initialize_database, SqliteConversationRepository, SqliteTaskRepository,
};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{ChatService, OwnershipGuard, RetryPolicy};

pub type SqliteChatService = ChatService<SqliteTaskRepository, SqliteConversationRepository>;

/// Load configuration from an explicit file or the default hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the configured database with migrations applied.
pub async fn open_database(config: &Config) -> Result<SqlitePool> {
    initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to initialize database at {}", config.database.path))
}

/// Build the chat pipeline and the guard the task API shares with it.
pub fn build_services(
    pool: SqlitePool,
    config: &Config,
) -> Result<(SqliteChatService, OwnershipGuard<SqliteTaskRepository>)> {
    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let conversations = Arc::new(SqliteConversationRepository::new(pool));
    let oracle = build_oracle(&config.reasoning).context("Failed to set up the reasoning provider")?;

    let chat = ChatService::new(
        Arc::clone(&tasks),
        conversations,
        oracle,
        config.conversation,
        RetryPolicy::once(config.reasoning.retry_backoff_ms),
    );
    Ok((chat, OwnershipGuard::new(tasks)))
}
