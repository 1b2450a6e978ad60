use anyhow::{Context, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{output, CommandOutput};
use crate::cli::runtime::{build_services, open_database};
use crate::domain::models::Config;

#[derive(Debug, Serialize)]
pub struct ChatOutput {
    pub response: String,
    pub conversation_id: Uuid,
}

impl CommandOutput for ChatOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n\n(conversation {}; pass --conversation {} to continue)",
            self.response, self.conversation_id, self.conversation_id
        )
    }
}

/// Send one message as `user` and print the reply.
pub async fn execute(
    config: Config,
    user: String,
    conversation: Option<Uuid>,
    message: String,
    json_mode: bool,
) -> Result<()> {
    let pool = open_database(&config).await?;
    let (chat, _) = build_services(pool, &config)?;

    let reply = chat
        .handle_turn(&user, &message, conversation)
        .await
        .context("Chat turn failed")?;

    output(
        &ChatOutput {
            response: reply.response,
            conversation_id: reply.conversation_id,
        },
        json_mode,
    );
    Ok(())
}
