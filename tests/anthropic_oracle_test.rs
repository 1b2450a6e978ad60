use serde_json::json;
use uuid::Uuid;

use chatdo::adapters::oracles::{AnthropicOracle, AnthropicOracleConfig};
use chatdo::domain::errors::DomainError;
use chatdo::domain::models::{ConversationContext, Operation, TaskReference};
use chatdo::domain::ports::ReasoningOracle;

fn oracle(server: &mockito::Server) -> AnthropicOracle {
    AnthropicOracle::new(
        AnthropicOracleConfig::default()
            .with_api_key("test-key")
            .with_base_url(server.url()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_interpret_parses_intents() {
    let mut server = mockito::Server::new_async().await;
    let text = json!({"intents": [
        {"operation": "create", "title": "buy milk", "confidence": 0.95},
        {"operation": "complete", "target": {"kind": "pronoun"}, "chained": true}
    ]})
    .to_string();
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .match_header("anthropic-version", "2023-06-01")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"content": [{"type": "text", "text": text}]}).to_string())
        .create_async()
        .await;

    let context = ConversationContext::empty(Uuid::new_v4(), "alice");
    let proposals = oracle(&server).interpret(&context, "add buy milk and complete it").await.unwrap();

    mock.assert_async().await;
    assert_eq!(proposals.len(), 2);
    assert_eq!(proposals[0].operation, Operation::Create);
    assert_eq!(proposals[0].title.as_deref(), Some("buy milk"));
    assert_eq!(proposals[1].target, Some(TaskReference::Pronoun));
    assert!(proposals[1].chained);
}

#[tokio::test]
async fn test_api_error_is_upstream_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .with_body(r#"{"type": "error", "error": {"type": "overloaded_error"}}"#)
        .create_async()
        .await;

    let context = ConversationContext::empty(Uuid::new_v4(), "alice");
    let result = oracle(&server).interpret(&context, "add milk").await;
    assert!(matches!(result, Err(DomainError::UpstreamReasoning(_))));
}

#[tokio::test]
async fn test_prose_reply_is_upstream_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"content": [{"type": "text", "text": "Sure, I added it!"}]}).to_string())
        .create_async()
        .await;

    let context = ConversationContext::empty(Uuid::new_v4(), "alice");
    let result = oracle(&server).interpret(&context, "add milk").await;
    assert!(matches!(result, Err(DomainError::UpstreamReasoning(_))));
}
