//! Anthropic Messages API reasoning oracle.
//!
//! Sends the compacted conversation plus the new message and asks the model
//! for a JSON list of intent proposals. The model never calls tools itself:
//! its answer is only a proposal that goes through resolution and the
//! ownership guard like any other.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConversationContext, IntentProposal, MessageRole, ReasoningConfig};
use crate::domain::ports::ReasoningOracle;

const SYSTEM_PROMPT: &str = r##"You interpret messages sent to a personal to-do list assistant.
Reply with a single JSON object and nothing else:
{"intents": [ { "operation": "create|list|update|complete|delete|none",
                "title": string|null, "description": string|null,
                "target": {"kind": "id", "value": 3} | {"kind": "ordinal", "value": 2} |
                          {"kind": "last"} | {"kind": "pronoun"} | {"kind": "title", "value": "buy milk"} | null,
                "filter": "all|pending|completed"|null,
                "chained": bool, "small_talk": "greeting|help|unclear"|null,
                "confidence": number between 0 and 1 } ]}
Rules:
- One intent per requested operation, in the order the user said them.
- "task 3" or "#3" is {"kind": "id"}; "the second one" is {"kind": "ordinal"} over the last list shown.
- Set "chained" when an intent acts on the task produced by the intent just before it ("add milk and complete it").
- Never invent a title or target you cannot read from the message; leave it null.
- Greetings, help requests and anything else without an operation use "none" with small_talk set."##;

/// Configuration for the Anthropic API oracle.
#[derive(Debug, Clone)]
pub struct AnthropicOracleConfig {
    /// API key (will be read from ANTHROPIC_API_KEY env if not set).
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    pub model: String,
    /// API version header.
    pub api_version: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for AnthropicOracleConfig {
    fn default() -> Self {
        Self::from(&ReasoningConfig::default())
    }
}

impl From<&ReasoningConfig> for AnthropicOracleConfig {
    fn from(config: &ReasoningConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            timeout_secs: config.timeout_secs,
            max_tokens: config.max_tokens,
        }
    }
}

impl AnthropicOracleConfig {
    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    /// Create config with explicit API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: ApiRole,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct IntentEnvelope {
    #[serde(default)]
    intents: Vec<IntentProposal>,
}

/// Reasoning oracle backed by the Anthropic Messages API.
pub struct AnthropicOracle {
    config: AnthropicOracleConfig,
    client: Client,
}

impl AnthropicOracle {
    /// Fails when no API key is configured or the HTTP client cannot be built.
    pub fn new(config: AnthropicOracleConfig) -> DomainResult<Self> {
        if config.get_api_key().is_none() {
            return Err(DomainError::ValidationFailed(
                "ANTHROPIC_API_KEY not set and no api_key configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DomainError::ValidationFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn build_request<'a>(
        &'a self,
        context: &ConversationContext,
        message: &str,
    ) -> MessagesRequest<'a> {
        let mut system = SYSTEM_PROMPT.to_string();
        if let Some(summary) = &context.summary {
            system.push_str("\n\nEarlier in this conversation:\n");
            system.push_str(summary);
        }
        if !context.surfaced.listed.is_empty() {
            system.push_str("\n\nThe last list shown to the user, in order:\n");
            for (position, task) in context.surfaced.listed.iter().enumerate() {
                system.push_str(&format!("{}. task #{} \"{}\"\n", position + 1, task.id, task.title));
            }
        }

        let history = context
            .turns
            .iter()
            .flat_map(|turn| turn.messages.iter())
            .map(|m| {
                let role = match m.role {
                    MessageRole::User => ApiRole::User,
                    MessageRole::Assistant => ApiRole::Assistant,
                };
                (role, m.content.as_str())
            })
            .chain(std::iter::once((ApiRole::User, message)));

        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: alternate(history),
            temperature: 0.0,
        }
    }
}

/// The API wants alternating roles starting with the user.
fn alternate<'a>(messages: impl Iterator<Item = (ApiRole, &'a str)>) -> Vec<ApiMessage> {
    let mut out: Vec<ApiMessage> = Vec::new();
    for (role, content) in messages {
        if out.is_empty() && role == ApiRole::Assistant {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(content);
            }
            _ => out.push(ApiMessage {
                role,
                content: content.to_string(),
            }),
        }
    }
    out
}

/// Pull the JSON object out of a text reply that may carry prose or fences.
fn parse_proposals(text: &str) -> DomainResult<Vec<IntentProposal>> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(DomainError::UpstreamReasoning(
                "reply did not contain a JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str::<IntentEnvelope>(json)
        .map(|envelope| envelope.intents)
        .map_err(|e| DomainError::UpstreamReasoning(format!("malformed intent JSON: {e}")))
}

#[async_trait]
impl ReasoningOracle for AnthropicOracle {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn interpret(
        &self,
        context: &ConversationContext,
        message: &str,
    ) -> DomainResult<Vec<IntentProposal>> {
        let api_key = self
            .config
            .get_api_key()
            .ok_or_else(|| DomainError::UpstreamReasoning("API key missing".to_string()))?;
        let request = self.build_request(context, message);

        debug!(model = %self.config.model, messages = request.messages.len(), "calling Anthropic API");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::UpstreamReasoning(format!("API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Anthropic API returned an error");
            return Err(DomainError::UpstreamReasoning(format!("API error {status}: {body}")));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| DomainError::UpstreamReasoning(format!("Failed to parse response: {e}")))?;

        let text: String = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        parse_proposals(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ContextMessage, Operation, TaskReference, Turn};
    use uuid::Uuid;

    #[test]
    fn test_parse_proposals_from_fenced_reply() {
        let text = "```json\n{\"intents\": [{\"operation\": \"complete\", \"target\": {\"kind\": \"id\", \"value\": 3}}]}\n```";
        let proposals = parse_proposals(text).unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].operation, Operation::Complete);
        assert_eq!(proposals[0].target, Some(TaskReference::Id(3)));
        assert!((proposals[0].confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_proposals_rejects_prose() {
        assert!(matches!(
            parse_proposals("I think you want to add milk"),
            Err(DomainError::UpstreamReasoning(_))
        ));
    }

    #[test]
    fn test_history_alternates_starting_with_user() {
        let oracle = AnthropicOracle::new(AnthropicOracleConfig::default().with_api_key("k")).unwrap();
        let mut context = ConversationContext::empty(Uuid::new_v4(), "alice");
        context.turns = vec![
            Turn {
                messages: vec![ContextMessage {
                    role: MessageRole::Assistant,
                    content: "welcome".to_string(),
                }],
            },
            Turn {
                messages: vec![ContextMessage {
                    role: MessageRole::User,
                    content: "add milk".to_string(),
                }],
            },
        ];

        let request = oracle.build_request(&context, "show my tasks");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, ApiRole::User);
        assert_eq!(request.messages[0].content, "add milk\n\nshow my tasks");
    }

    #[test]
    fn test_system_prompt_keeps_every_rule() {
        let oracle = AnthropicOracle::new(AnthropicOracleConfig::default().with_api_key("k")).unwrap();
        let context = ConversationContext::empty(Uuid::new_v4(), "alice");
        let request = oracle.build_request(&context, "complete #3");
        assert!(request.system.contains(r##""task 3" or "#3" is {"kind": "id"}"##));
        assert!(request.system.contains("\"chained\""));
        assert!(request.system.ends_with("small_talk set."));
    }
}
