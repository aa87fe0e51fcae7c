use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{
    ApprovalDecision, OversightRequest, RequestPriority, RequestStatus, RequiredReviewer,
};
use crate::infrastructure::database::DatabaseError;

/// Filters for listing open requests.
#[derive(Default, Debug, Clone)]
pub struct PendingFilters {
    pub organization_id: Option<String>,
    pub agent_id: Option<String>,
    pub status: Option<RequestStatus>,
    pub priority: Option<RequestPriority>,
    pub limit: Option<i64>,
}

/// Repository port for oversight requests and their reviewer/decision rows.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Insert a new request together with its required reviewer slots.
    async fn insert(
        &self,
        request: &OversightRequest,
        reviewers: &[RequiredReviewer],
    ) -> Result<(), DatabaseError>;

    /// Get a request by ID.
    async fn get(&self, id: Uuid) -> Result<Option<OversightRequest>, DatabaseError>;

    /// List open (non-terminal) requests with optional filters.
    async fn list_pending(
        &self,
        filters: PendingFilters,
    ) -> Result<Vec<OversightRequest>, DatabaseError>;

    /// Open requests whose `timeout_at` is at or before `now`.
    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OversightRequest>, DatabaseError>;

    /// Open requests, for the escalation sweep.
    async fn list_open(&self) -> Result<Vec<OversightRequest>, DatabaseError>;

    /// Compare-and-swap status update: writes the new status, bumped
    /// version, `updated_at`, and `resolved_at` only when the stored
    /// version still equals `expected_version`. Returns
    /// [`DatabaseError::OptimisticLockConflict`] otherwise.
    async fn update_status(
        &self,
        id: Uuid,
        expected_version: u32,
        new_status: RequestStatus,
        updated_at: DateTime<Utc>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError>;

    /// Required reviewer slots for a request.
    async fn list_reviewers(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<RequiredReviewer>, DatabaseError>;

    /// Insert one decision. Fails with
    /// [`DatabaseError::DuplicateDecision`] when the (request, reviewer)
    /// pair already has one.
    async fn insert_decision(&self, decision: &ApprovalDecision) -> Result<(), DatabaseError>;

    /// Decisions recorded for a request, oldest first.
    async fn list_decisions(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ApprovalDecision>, DatabaseError>;
}
