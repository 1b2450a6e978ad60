mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use chatdo::adapters::http::{ChatHttpConfig, ChatHttpServer};

const AUTH: &str = "x-authenticated-user";

async fn router() -> Router {
    let h = common::harness().await;
    ChatHttpServer::new(h.chat, h.guard, ChatHttpConfig::default()).build_router()
}

async fn send(router: &Router, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        request = request.header(AUTH, user);
    }
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let router = router().await;
    let (status, body) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_chat_round_trip() {
    let router = router().await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/alice/chat",
        Some("alice"),
        Some(json!({"message": "add buy milk"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("buy milk"));
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        "POST",
        "/api/alice/chat",
        Some("alice"),
        Some(json!({"message": "show my tasks", "conversation_id": conversation_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["response"].as_str().unwrap().starts_with("Your tasks:"));

    let (status, body) = send(
        &router,
        "GET",
        &format!("/api/alice/conversations/{conversation_id}/messages"),
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);
    assert_eq!(body[0]["role"], "user");
}

#[tokio::test]
async fn test_authentication_boundary() {
    let router = router().await;
    let (status, body) = send(&router, "GET", "/api/alice/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, _) = send(&router, "GET", "/api/alice/tasks", Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_task_crud() {
    let router = router().await;
    let (status, task) = send(
        &router,
        "POST",
        "/api/alice/tasks",
        Some("alice"),
        Some(json!({"title": "buy milk", "description": "2 litres"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["completed"], false);
    let id = task["id"].as_i64().unwrap();
    let uri = format!("/api/alice/tasks/{id}");

    let (status, task) = send(&router, "PUT", &uri, Some("alice"), Some(json!({"title": "buy oat milk"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["title"], "buy oat milk");
    assert_eq!(task["description"], "2 litres");

    for _ in 0..2 {
        let (status, task) = send(&router, "PATCH", &format!("{uri}/complete"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["completed"], true);
    }

    let (status, tasks) = send(&router, "GET", "/api/alice/tasks?status=pending", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tasks.as_array().unwrap().is_empty());

    let (status, _) = send(&router, "DELETE", &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&router, "DELETE", &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Task not found");
}

#[tokio::test]
async fn test_foreign_task_is_404() {
    let router = router().await;
    let (_, task) = send(&router, "POST", "/api/alice/tasks", Some("alice"), Some(json!({"title": "milk"}))).await;
    let id = task["id"].as_i64().unwrap();

    let (status, _) = send(&router, "GET", &format!("/api/bob/tasks/{id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&router, "DELETE", &format!("/api/bob/tasks/{id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&router, "GET", &format!("/api/alice/tasks/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validation_errors_are_422() {
    let router = router().await;
    let (status, body) = send(&router, "POST", "/api/alice/tasks", Some("alice"), Some(json!({"title": "   "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "task title cannot be empty");

    let (status, _) = send(&router, "POST", "/api/alice/chat", Some("alice"), Some(json!({"message": ""}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&router, "GET", "/api/alice/tasks?status=someday", Some("alice"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_tool_endpoint() {
    let router = router().await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/alice/tools",
        Some("alice"),
        Some(json!({"tool": "create", "title": "call mom"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "created");
    assert_eq!(body["task"]["title"], "call mom");

    let (status, body) = send(
        &router,
        "POST",
        "/api/alice/tools",
        Some("alice"),
        Some(json!({"tool": "list", "filter": "pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_conversation_is_404() {
    let router = router().await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/alice/chat",
        Some("alice"),
        Some(json!({"message": "hi", "conversation_id": uuid::Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Conversation not found");
}

#[tokio::test]
async fn test_malformed_requests_use_detail_body() {
    let router = router().await;
    let (status, body) = send(
        &router,
        "POST",
        "/api/alice/chat",
        Some("alice"),
        Some(json!({"message": "hi", "conversation_id": "not-a-uuid"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "Invalid request body");

    let (status, body) = send(&router, "POST", "/api/alice/chat", Some("alice"), None).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["detail"], "Expected a JSON request body");

    let (status, body) = send(&router, "PATCH", "/api/alice/tasks/abc/complete", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not found");

    let (status, body) = send(&router, "GET", "/api/alice/conversations/xyz/messages", Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}
