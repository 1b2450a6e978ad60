//! Chat and task HTTP server.
//!
//! Every `/api/{user_id}/...` route trusts the user id an upstream auth proxy
//! puts in the configured header. The path user must match it. Task routes go
//! through the same ownership guard as chat tool calls.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{Message, ServerConfig, Task, TaskFilter, TaskId, ToolCall, ToolResult};
use crate::domain::ports::{ConversationRepository, TaskRepository};
use crate::services::{ChatReply, ChatService, OwnershipGuard};

/// Configuration for the chat HTTP server.
#[derive(Debug, Clone)]
pub struct ChatHttpConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    /// Header carrying the upstream-verified user id.
    pub auth_header: String,
}

impl Default for ChatHttpConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ChatHttpConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            enable_cors: config.enable_cors,
            auth_header: config.auth_header.to_lowercase(),
        }
    }
}

/// Chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

/// Request to create a task.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to change a task. At least one field is required.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Query parameters for task listing.
#[derive(Debug, Deserialize)]
pub struct TaskQueryParams {
    #[serde(default)]
    pub status: Option<String>,
}

/// Response with a task.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: TaskId,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            user_id: t.owner_id,
            title: t.title,
            description: t.description,
            completed: t.completed,
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.to_rfc3339(),
        }
    }
}

/// Response with one conversation message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role.as_str().to_string(),
            content: m.content,
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Error body: `{"detail": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// A domain error translated to a status code and a safe detail.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let (status, detail) = match err {
            DomainError::ValidationFailed(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            DomainError::TaskNotFound(_) => (StatusCode::NOT_FOUND, "Task not found".to_string()),
            DomainError::ConversationNotFound(_) => {
                (StatusCode::NOT_FOUND, "Conversation not found".to_string())
            }
            DomainError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            DomainError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Not authorized to access this user's resources".to_string(),
            ),
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        Self { status, detail }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(%rejection, "rejected request body");
        let detail = match &rejection {
            JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body",
            _ => "Invalid request body",
        };
        Self {
            status: rejection.status(),
            detail: detail.to_string(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!(%rejection, "rejected request path");
        Self {
            status: StatusCode::NOT_FOUND,
            detail: "Not found".to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(%rejection, "rejected query string");
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: "Invalid query string".to_string(),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `Json` body whose rejections carry the `{"detail": ...}` body.
struct ApiJson<T>(T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Path` params; a segment that does not parse is a missing resource.
struct ApiPath<T>(T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

struct ApiQuery<T>(T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Shared state for the chat HTTP server.
struct AppState<T: TaskRepository, C: ConversationRepository> {
    chat: ChatService<T, C>,
    guard: OwnershipGuard<T>,
    auth_header: String,
}

impl<T: TaskRepository, C: ConversationRepository> AppState<T, C> {
    /// The verified caller, who must be the user named in the path.
    fn authorize(&self, headers: &HeaderMap, user_id: &str) -> ApiResult<String> {
        let caller = headers
            .get(self.auth_header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(DomainError::Unauthenticated)?;

        if caller != user_id {
            return Err(DomainError::Forbidden.into());
        }
        Ok(caller.to_string())
    }
}

/// Chat HTTP Server.
pub struct ChatHttpServer<T: TaskRepository + 'static, C: ConversationRepository + 'static> {
    config: ChatHttpConfig,
    chat: ChatService<T, C>,
    guard: OwnershipGuard<T>,
}

impl<T: TaskRepository + 'static, C: ConversationRepository + 'static> ChatHttpServer<T, C> {
    pub fn new(chat: ChatService<T, C>, guard: OwnershipGuard<T>, config: ChatHttpConfig) -> Self {
        Self {
            config,
            chat,
            guard,
        }
    }

    /// Build the router.
    pub fn build_router(self) -> Router {
        let state = Arc::new(AppState {
            chat: self.chat,
            guard: self.guard,
            auth_header: self.config.auth_header.clone(),
        });

        let app = Router::new()
            .route("/api/{user_id}/chat", post(chat::<T, C>))
            .route(
                "/api/{user_id}/tasks",
                get(list_tasks::<T, C>).post(create_task::<T, C>),
            )
            .route(
                "/api/{user_id}/tasks/{task_id}",
                get(get_task::<T, C>)
                    .put(update_task::<T, C>)
                    .delete(delete_task::<T, C>),
            )
            .route("/api/{user_id}/tasks/{task_id}/complete", patch(complete_task::<T, C>))
            .route("/api/{user_id}/tools", post(call_tool::<T, C>))
            .route(
                "/api/{user_id}/conversations/{conversation_id}/messages",
                get(list_messages::<T, C>),
            )
            .route("/health", get(health_check))
            .with_state(state);

        if self.config.enable_cors {
            app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(TraceLayer::new_for_http())
        } else {
            app.layer(TraceLayer::new_for_http())
        }
    }

    fn addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
        Ok(format!("{}:{}", self.config.host, self.config.port).parse()?)
    }

    /// Start the server.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr()?;
        let router = self.build_router();

        tracing::info!("chat HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.addr()?;
        let router = self.build_router();

        tracing::info!("chat HTTP server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath(user_id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let owner = state.authorize(&headers, &user_id)?;
    let reply = state
        .chat
        .handle_turn(&owner, &req.message, req.conversation_id)
        .await?;
    Ok(Json(reply))
}

async fn list_tasks<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath(user_id): ApiPath<String>,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<TaskQueryParams>,
) -> ApiResult<Json<Vec<TaskResponse>>> {
    let owner = state.authorize(&headers, &user_id)?;
    let filter = match params.status.as_deref() {
        None => TaskFilter::All,
        Some(status) => TaskFilter::from_str(status).ok_or_else(|| {
            DomainError::validation(format!("unknown status filter '{status}'"))
        })?,
    };

    match state.guard.execute(&owner, &ToolCall::List { filter }).await? {
        ToolResult::Listed { tasks, .. } => Ok(Json(tasks.into_iter().map(TaskResponse::from).collect())),
        other => Err(unexpected(&other)),
    }
}

async fn create_task<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath(user_id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let owner = state.authorize(&headers, &user_id)?;
    let call = ToolCall::Create {
        title: req.title,
        description: req.description,
    };
    match state.guard.execute(&owner, &call).await? {
        ToolResult::Created { task } => Ok((StatusCode::CREATED, Json(TaskResponse::from(task)))),
        other => Err(unexpected(&other)),
    }
}

async fn get_task<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath((user_id, task_id)): ApiPath<(String, TaskId)>,
    headers: HeaderMap,
) -> ApiResult<Json<TaskResponse>> {
    let owner = state.authorize(&headers, &user_id)?;
    let task = state.guard.fetch(&owner, task_id).await?;
    Ok(Json(TaskResponse::from(task)))
}

async fn update_task<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath((user_id, task_id)): ApiPath<(String, TaskId)>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let owner = state.authorize(&headers, &user_id)?;
    let call = ToolCall::Update {
        task_id,
        title: req.title,
        description: req.description,
    };
    match state.guard.execute(&owner, &call).await? {
        ToolResult::Updated { task } => Ok(Json(TaskResponse::from(task))),
        other => Err(unexpected(&other)),
    }
}

async fn complete_task<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath((user_id, task_id)): ApiPath<(String, TaskId)>,
    headers: HeaderMap,
) -> ApiResult<Json<TaskResponse>> {
    let owner = state.authorize(&headers, &user_id)?;
    match state.guard.execute(&owner, &ToolCall::Complete { task_id }).await? {
        ToolResult::Completed { task, .. } => Ok(Json(TaskResponse::from(task))),
        other => Err(unexpected(&other)),
    }
}

async fn delete_task<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath((user_id, task_id)): ApiPath<(String, TaskId)>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let owner = state.authorize(&headers, &user_id)?;
    state.guard.execute(&owner, &ToolCall::Delete { task_id }).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn call_tool<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath(user_id): ApiPath<String>,
    headers: HeaderMap,
    ApiJson(call): ApiJson<ToolCall>,
) -> ApiResult<Json<ToolResult>> {
    let owner = state.authorize(&headers, &user_id)?;
    let result = state.guard.execute(&owner, &call).await?;
    Ok(Json(result))
}

async fn list_messages<T: TaskRepository + 'static, C: ConversationRepository + 'static>(
    State(state): State<Arc<AppState<T, C>>>,
    ApiPath((user_id, conversation_id)): ApiPath<(String, Uuid)>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let owner = state.authorize(&headers, &user_id)?;
    let messages = state.chat.history(&owner, conversation_id).await?;
    Ok(Json(messages.into_iter().map(MessageResponse::from).collect()))
}

fn unexpected(result: &ToolResult) -> ApiError {
    error!(?result, "unexpected tool result");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: "Internal server error".to_string(),
    }
}
