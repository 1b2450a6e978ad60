mod common;

use chatdo::domain::errors::DomainError;
use chatdo::domain::models::{TaskFilter, ToolCall, ToolResult};
use chatdo::domain::ports::TaskRepository;

use common::harness;

async fn create(h: &common::Harness, owner: &str, title: &str) -> i64 {
    let call = ToolCall::Create {
        title: title.to_string(),
        description: None,
    };
    match h.guard.execute(owner, &call).await.unwrap() {
        ToolResult::Created { task } => task.id,
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn test_foreign_task_is_not_found_for_every_operation() {
    let h = harness().await;
    let id = create(&h, "alice", "alice's secret").await;

    let calls = [
        ToolCall::Update {
            task_id: id,
            title: Some("mine now".to_string()),
            description: None,
        },
        ToolCall::Complete { task_id: id },
        ToolCall::Delete { task_id: id },
    ];
    for call in &calls {
        let result = h.guard.execute("bob", call).await;
        assert!(
            matches!(result, Err(DomainError::TaskNotFound(found)) if found == id),
            "{call:?} leaked: {result:?}"
        );
    }
    assert!(matches!(h.guard.fetch("bob", id).await, Err(DomainError::TaskNotFound(_))));

    let task = h.guard.fetch("alice", id).await.unwrap();
    assert_eq!(task.title, "alice's secret");
    assert!(!task.completed);
}

#[tokio::test]
async fn test_missing_owner_is_rejected_before_storage() {
    let h = harness().await;
    let result = h
        .guard
        .execute("", &ToolCall::List { filter: TaskFilter::All })
        .await;
    assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
}

#[tokio::test]
async fn test_deleting_never_touches_other_users() {
    let h = harness().await;
    let alice_id = create(&h, "alice", "milk").await;
    create(&h, "bob", "milk").await;

    h.guard
        .execute("alice", &ToolCall::Delete { task_id: alice_id })
        .await
        .unwrap();

    let bob = h.tasks.list_owned("bob", TaskFilter::All).await.unwrap();
    assert_eq!(bob.len(), 1);
    assert!(h.tasks.list_owned("alice", TaskFilter::All).await.unwrap().is_empty());

    let again = h.guard.execute("alice", &ToolCall::Delete { task_id: alice_id }).await;
    assert!(matches!(again, Err(DomainError::TaskNotFound(_))));
}

#[tokio::test]
async fn test_chat_cannot_reach_foreign_task() {
    let h = harness().await;
    let id = create(&h, "alice", "milk").await;

    let reply = h.say("bob", &format!("delete task {id}"), None).await;
    assert_eq!(
        reply.response,
        format!("I couldn't find task #{id}. Which task did you mean?")
    );
    assert!(h.guard.fetch("alice", id).await.is_ok());

    let listing = h.say("bob", "show my tasks", Some(reply.conversation_id)).await;
    assert_eq!(listing.response, "You have no tasks.");
}

#[tokio::test]
async fn test_conversations_are_private() {
    let h = harness().await;
    let reply = h.say("alice", "add milk", None).await;

    let history = h.chat.history("bob", reply.conversation_id).await;
    assert!(matches!(history, Err(DomainError::ConversationNotFound(_))));

    let turn = h
        .chat
        .handle_turn("bob", "show my tasks", Some(reply.conversation_id))
        .await;
    assert!(matches!(turn, Err(DomainError::ConversationNotFound(_))));
    assert_eq!(h.chat.history("alice", reply.conversation_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_turns_from_one_user() {
    let h = harness().await;
    let turns = (0..8).map(|i| {
        let chat = &h.chat;
        async move { chat.handle_turn("alice", &format!("add item {i}"), None).await }
    });

    let replies = futures::future::join_all(turns).await;
    assert!(replies.iter().all(Result::is_ok));
    assert_eq!(h.tasks.list_owned("alice", TaskFilter::All).await.unwrap().len(), 8);
}
