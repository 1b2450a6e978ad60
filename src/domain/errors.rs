//! Domain errors for the chatdo pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy surfaced by the pipeline.
///
/// Every [`DomainError`] collapses into one of these kinds. The response
/// formatter and the HTTP layer only ever look at the kind, never at the
/// inner message, so storage details cannot leak to users. Ambiguity is not
/// here: it travels as `TurnResult::ClarificationNeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input. Caller's fault, never retried.
    Validation,
    /// Target absent or owned by someone else. The two are indistinguishable.
    NotFound,
    /// Transient storage or tool failure. Retried once by the orchestrator.
    ToolError,
    /// The reasoning oracle failed or timed out.
    UpstreamReasoning,
    /// No verified caller identity.
    Unauthenticated,
    /// Verified caller tried to act on another user's path.
    Forbidden,
    /// Anything else.
    Internal,
}

/// Domain-level errors that can occur in the chatdo system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Missing authenticated user")]
    Unauthenticated,

    #[error("Not authorized to access this user's resources")]
    Forbidden,

    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("Reasoning oracle failed: {0}")]
    UpstreamReasoning(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Collapse into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed(_) => ErrorKind::Validation,
            Self::TaskNotFound(_) | Self::ConversationNotFound(_) => ErrorKind::NotFound,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::Transient(_) => ErrorKind::ToolError,
            Self::UpstreamReasoning(_) => ErrorKind::UpstreamReasoning,
            Self::DatabaseError(_) | Self::SerializationError(_) => ErrorKind::Internal,
        }
    }

    /// Whether a single retry of the failed call is allowed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }
}

// SQLite primary result codes for a locked database (extended codes share the low byte).
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        let transient = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db_err) => {
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i64>().ok())
                    .map(|code| code & 0xff);
                matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED))
            }
            _ => false,
        };

        if transient {
            DomainError::Transient(err.to_string())
        } else {
            DomainError::DatabaseError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
