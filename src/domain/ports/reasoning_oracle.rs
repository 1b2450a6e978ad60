use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConversationContext, IntentProposal};

/// Black-box interpreter of chat messages.
///
/// An oracle only proposes intents. It never touches storage; everything it
/// suggests is resolved and validated before any tool runs.
///
/// Failures and timeouts surface as `DomainError::UpstreamReasoning` and are
/// not retried.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Propose zero or more intents, in the order the user stated them.
    async fn interpret(
        &self,
        context: &ConversationContext,
        message: &str,
    ) -> DomainResult<Vec<IntentProposal>>;
}
