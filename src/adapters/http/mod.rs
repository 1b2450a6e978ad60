//! HTTP transport for the chat pipeline and the task API.

pub mod chat_http;

pub use chat_http::{ApiError, ChatHttpConfig, ChatHttpServer, ErrorResponse};
