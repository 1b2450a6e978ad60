//! Chat pipeline services
//!
//! Every request builds its context from storage, runs the turn, and drops
//! everything again. The services hold repositories, never conversation state.

pub mod chat_service;
pub mod context_builder;
pub mod intent_resolver;
pub mod orchestrator;
pub mod ownership_guard;
pub mod persistence_gateway;
pub mod response_formatter;
pub mod retry;
pub mod tool_registry;

pub use chat_service::{ChatReply, ChatService, MAX_MESSAGE_LEN};
pub use context_builder::ContextBuilder;
pub use orchestrator::{Orchestrator, TurnState};
pub use ownership_guard::OwnershipGuard;
pub use persistence_gateway::PersistenceGateway;
pub use response_formatter::format_reply;
pub use retry::{Attempt, RetryPolicy};
pub use tool_registry::{ensure_owner, ToolRegistry};
