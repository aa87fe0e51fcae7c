use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(String),

    #[error("Connection pool error: {0}")]
    ConnectionPoolError(String),

    #[error("UUID parse error: {0}")]
    UuidParseError(#[from] uuid::Error),

    #[error("DateTime parse error: {0}")]
    DateTimeParseError(#[from] chrono::ParseError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFound(Uuid),

    /// Unique (request, reviewer) index hit: the reviewer already decided.
    #[error("Duplicate decision by {reviewer_id} on request {request_id}")]
    DuplicateDecision {
        request_id: Uuid,
        reviewer_id: String,
    },

    /// Optimistic lock conflict - the request was modified by another
    /// writer. The caller should re-read and retry.
    #[error("Optimistic lock conflict for request {request_id}: expected version {expected_version}, but request was modified")]
    OptimisticLockConflict {
        request_id: Uuid,
        expected_version: u32,
    },
}
