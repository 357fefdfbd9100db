//! Shared store error type used by every persistence port.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("task not found: {0}")]
    TaskNotFound(uuid::Uuid),

    #[error("agent not found: {0}")]
    AgentNotFound(uuid::Uuid),

    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("migration error: {0}")]
    MigrationError(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
