use thiserror::Error;
use uuid::Uuid;

use super::models::request::{ActionType, RequestStatus};
use crate::infrastructure::database::DatabaseError;

/// Caller-visible errors for oversight operations.
///
/// Each rejected operation maps to a distinct variant so calling UIs can
/// render "not authorized", "already resolved", or "reason required"
/// instead of a generic failure.
#[derive(Error, Debug)]
pub enum OversightError {
    #[error("Request not found: {0}")]
    NotFound(Uuid),

    #[error("Request {id} is already resolved ({status:?})")]
    AlreadyResolved { id: Uuid, status: RequestStatus },

    #[error("Reviewer {reviewer_id} is not in the required reviewer set")]
    NotAuthorized { reviewer_id: String },

    #[error("Reviewer {reviewer_id} has already decided on this request")]
    DuplicateDecision { reviewer_id: String },

    #[error("A rejection requires a non-empty reason")]
    ReasonRequired,

    #[error("Invalid admission input: {0}")]
    InvalidAdmission(String),

    #[error("No quorum policy matches organization {organization_id} for {action_type:?}")]
    PolicyNotFound {
        organization_id: String,
        action_type: ActionType,
    },

    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// The request was modified concurrently; the caller re-reads and
    /// retries through the serialized path.
    #[error("Version conflict on request {id}: expected version {expected_version}")]
    VersionConflict { id: Uuid, expected_version: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl OversightError {
    /// Conflict errors are distinguishable from validation errors so that
    /// callers can show "already decided" rather than "bad input".
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyResolved { .. }
                | Self::DuplicateDecision { .. }
                | Self::VersionConflict { .. }
        )
    }
}
