//! Port trait definitions (Hexagonal Architecture)
//!
//! - TaskRepository: owner-scoped task storage
//! - ConversationRepository: conversations and message logs
//! - ReasoningOracle: natural-language interpretation

pub mod conversation_repository;
pub mod reasoning_oracle;
pub mod task_repository;

pub use conversation_repository::ConversationRepository;
pub use reasoning_oracle::ReasoningOracle;
pub use task_repository::TaskRepository;
