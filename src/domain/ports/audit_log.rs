use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::StateTransition;
use crate::infrastructure::database::DatabaseError;

/// Append-only audit trail of state transitions.
///
/// Deliberately narrow: rows can be appended and read, never changed.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append one transition row.
    async fn append(&self, transition: &StateTransition) -> Result<(), DatabaseError>;

    /// Transition history for a request, oldest first.
    async fn history(&self, request_id: Uuid) -> Result<Vec<StateTransition>, DatabaseError>;
}
