//! Request lifecycle: the single transition authority.
//!
//! Every status change in the engine, human or time-driven, goes through
//! [`RequestLifecycle::transition`]. It validates the move against the
//! status transition table, writes the new status with a version check,
//! stamps `resolved_at` on terminal entry, and appends exactly one audit
//! row. No other code path writes `status`.

use std::sync::Arc;

use tracing::info;

use crate::domain::error::OversightError;
use crate::domain::models::{
    Actor, OversightRequest, RequestStatus, RequiredReviewer, StateTransition,
};
use crate::domain::ports::{AuditLog, Clock, RequestRepository};
use crate::infrastructure::database::DatabaseError;

pub struct RequestLifecycle {
    repo: Arc<dyn RequestRepository>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl RequestLifecycle {
    pub fn new(
        repo: Arc<dyn RequestRepository>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repo, audit, clock }
    }

    /// Record the admission of a freshly created request: persist it with
    /// its reviewer slots and append the creation audit row
    /// (`none → status`).
    pub async fn admit(
        &self,
        request: &OversightRequest,
        reviewers: &[RequiredReviewer],
        actor: Actor,
    ) -> Result<(), OversightError> {
        self.repo.insert(request, reviewers).await?;
        self.audit
            .append(&StateTransition::new(
                request.id,
                None,
                request.status,
                actor,
                request.created_at,
            ))
            .await?;
        info!(request_id = %request.id, status = request.status.as_str(), "request admitted");
        Ok(())
    }

    /// Apply one transition.
    ///
    /// Fails with [`OversightError::AlreadyResolved`] from terminal states
    /// and [`OversightError::InvalidTransition`] for moves outside the
    /// table. The status write is guarded by the request version: a
    /// concurrent writer loses with [`OversightError::VersionConflict`]
    /// and must re-read, so at most one terminal transition can ever be
    /// committed.
    pub async fn transition(
        &self,
        request: &OversightRequest,
        to: RequestStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<OversightRequest, OversightError> {
        if request.is_terminal() {
            return Err(OversightError::AlreadyResolved {
                id: request.id,
                status: request.status,
            });
        }
        if !request.can_transition_to(to) {
            return Err(OversightError::InvalidTransition {
                from: request.status,
                to,
            });
        }

        let now = self.clock.now();
        let resolved_at = if to.is_terminal() { Some(now) } else { None };

        self.repo
            .update_status(request.id, request.version, to, now, resolved_at)
            .await
            .map_err(|e| match e {
                DatabaseError::OptimisticLockConflict {
                    request_id,
                    expected_version,
                } => OversightError::VersionConflict {
                    id: request_id,
                    expected_version,
                },
                other => other.into(),
            })?;

        let mut transition =
            StateTransition::new(request.id, Some(request.status), to, actor, now);
        if let Some(reason) = reason {
            transition = transition.with_reason(reason);
        }
        self.audit.append(&transition).await?;

        info!(
            request_id = %request.id,
            from = request.status.as_str(),
            to = to.as_str(),
            "state transition"
        );

        let mut updated = request.clone();
        updated.status = to;
        updated.updated_at = now;
        updated.resolved_at = resolved_at;
        updated.version += 1;
        Ok(updated)
    }

    /// Audit history for a request, oldest first.
    pub async fn history(
        &self,
        request_id: uuid::Uuid,
    ) -> Result<Vec<StateTransition>, OversightError> {
        Ok(self.audit.history(request_id).await?)
    }
}
