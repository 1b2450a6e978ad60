pub mod config;
pub mod context;
pub mod conversation;
pub mod intent;
pub mod task;
pub mod tool;

pub use config::{
    Config, ConversationConfig, DatabaseConfig, LoggingConfig, ReasoningConfig, ReasoningProvider,
    ServerConfig,
};
pub use context::{ContextMessage, ConversationContext, SurfacedTasks, Turn};
pub use conversation::{Conversation, Message, MessageRole};
pub use intent::{
    IntentField, IntentParams, IntentProposal, IntentTarget, Operation, ResolvedIntent, SmallTalk,
    TaskReference,
};
pub use task::{
    NewTask, Task, TaskChanges, TaskFilter, TaskHandle, TaskId, MAX_DESCRIPTION_LEN,
    MAX_TITLE_LEN,
};
pub use tool::{
    ClarificationNeed, OutcomeStatus, SkipReason, ToolCall, ToolCallOutcome, ToolResult,
    TurnResult,
};
