//! chatdo - a stateless conversational to-do manager
//!
//! Users manage tasks by chatting. Each turn rebuilds its context from
//! storage, asks a reasoning oracle what the user meant, resolves task
//! references, and runs the requested operations through an ownership guard.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, error taxonomy, port traits
//! - **Service Layer** (`services`): the chat pipeline
//! - **Adapters** (`adapters`): SQLite storage, reasoning oracles, HTTP
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use chatdo::cli::runtime::{build_services, load_config, open_database};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(None)?;
//!     let (chat, _) = build_services(open_database(&config).await?, &config)?;
//!     let reply = chat.handle_turn("alice", "add buy milk", None).await?;
//!     println!("{}", reply.response);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    Config, Conversation, Message, MessageRole, Task, TaskFilter, ToolCall, ToolResult,
    TurnResult,
};
pub use domain::ports::{ConversationRepository, ReasoningOracle, TaskRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ChatReply, ChatService};
