//! Oversight service facade.
//!
//! Public surface of the engine: admit a proposed action, record reviewer
//! decisions, cancel, query, and the monitor-facing expiry/escalation
//! entry points. All mutations of one request are serialized through a
//! per-request async mutex; the repository's version check backs that up,
//! so two racing writers can never both commit a terminal transition.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::OversightError;
use crate::domain::models::{
    ActionType, Actor, ApprovalDecision, DecisionKind, EscalationRule, NotificationEventKind,
    OversightRequest, QuorumConfig, RequestPriority, RequestStatus, RequiredReviewer,
    ReviewerRef, ReviewerRequirement, RiskAssessment, StateTransition,
};
use crate::domain::ports::{Clock, PendingFilters, PolicyStore, RequestRepository};
use crate::infrastructure::database::DatabaseError;
use crate::services::aggregator::{DecisionAggregator, Verdict};
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::lifecycle::RequestLifecycle;

/// One reviewer slot requested at admission.
#[derive(Debug, Clone)]
pub struct ReviewerSpec {
    pub requirement: ReviewerRequirement,
    pub weight: u32,
}

impl ReviewerSpec {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            requirement: ReviewerRequirement::User(id.into()),
            weight: 1,
        }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self {
            requirement: ReviewerRequirement::Role(role.into()),
            weight: 1,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }
}

/// Admission input.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub organization_id: String,
    pub agent_id: String,
    pub action_type: ActionType,
    pub action_data: serde_json::Value,
    pub description: String,
    pub justification: Option<String>,
    pub amount: Option<Decimal>,
    pub resource: Option<String>,
    pub priority: RequestPriority,
    pub risk: RiskAssessment,
    pub reviewers: Vec<ReviewerSpec>,
}

impl AdmissionRequest {
    pub fn new(
        organization_id: impl Into<String>,
        agent_id: impl Into<String>,
        action_type: ActionType,
        description: impl Into<String>,
        risk: RiskAssessment,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            agent_id: agent_id.into(),
            action_type,
            action_data: serde_json::Value::Object(serde_json::Map::new()),
            description: description.into(),
            justification: None,
            amount: None,
            resource: None,
            priority: RequestPriority::default(),
            risk,
            reviewers: Vec::new(),
        }
    }

    pub fn with_action_data(mut self, data: serde_json::Value) -> Self {
        self.action_data = data;
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_reviewer(mut self, spec: ReviewerSpec) -> Self {
        self.reviewers.push(spec);
        self
    }
}

pub struct OversightService {
    repo: Arc<dyn RequestRepository>,
    policies: Arc<dyn PolicyStore>,
    lifecycle: RequestLifecycle,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    /// Per-request mutexes serializing decisions, escalation, expiry, and
    /// cancellation against each other. Entries are pruned once terminal.
    locks: StdMutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl OversightService {
    pub fn new(
        repo: Arc<dyn RequestRepository>,
        policies: Arc<dyn PolicyStore>,
        lifecycle: RequestLifecycle,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            policies,
            lifecycle,
            dispatcher,
            clock,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .expect("lock map poisoned")
            .entry(id)
            .or_default()
            .clone()
    }

    fn prune_lock(&self, id: Uuid) {
        self.locks.lock().expect("lock map poisoned").remove(&id);
    }

    /// Admit a proposed action.
    ///
    /// Auto-approval rules are checked first: a match creates the request
    /// directly in `approved` with no reviewer slots and no notifications.
    /// Otherwise the quorum policy resolves (failing admission when none
    /// matches), the request is persisted as `pending`, the admission
    /// audit row is written, and the required reviewers are notified.
    pub async fn admit(
        &self,
        admission: AdmissionRequest,
    ) -> Result<OversightRequest, OversightError> {
        let now = self.clock.now();

        // Auto-approval bypass.
        let rules = self.policies.find_auto_approval(&admission.organization_id).await?;
        let auto_approved = rules.iter().any(|rule| {
            rule.matches(
                admission.action_type,
                admission.amount,
                admission.resource.as_deref(),
                &admission.risk,
            )
        });
        if auto_approved {
            let policy = QuorumConfig::new(&admission.organization_id, "auto_approval");
            let mut request = Self::build_request(&admission, policy, now);
            request.status = RequestStatus::Approved;
            request.resolved_at = Some(now);
            request.auto_approval_attempted = true;
            request
                .validate()
                .map_err(OversightError::InvalidAdmission)?;

            self.lifecycle.admit(&request, &[], Actor::policy()).await?;
            debug!(request_id = %request.id, "auto-approved");
            return Ok(request);
        }

        let policy = self
            .policies
            .resolve_quorum(
                &admission.organization_id,
                admission.action_type,
                admission.amount,
            )
            .await?
            .ok_or_else(|| OversightError::PolicyNotFound {
                organization_id: admission.organization_id.clone(),
                action_type: admission.action_type,
            })?;

        if admission.reviewers.is_empty() {
            return Err(OversightError::InvalidAdmission(
                "at least one required reviewer is needed".to_string(),
            ));
        }

        let mut request = Self::build_request(&admission, policy, now);
        if let Some(secs) = request.policy.approval_timeout_secs {
            request.timeout_at = Some(now + Duration::seconds(secs as i64));
        }
        request
            .validate()
            .map_err(OversightError::InvalidAdmission)?;

        let reviewers: Vec<RequiredReviewer> = admission
            .reviewers
            .iter()
            .map(|spec| RequiredReviewer {
                id: Uuid::new_v4(),
                request_id: request.id,
                requirement: spec.requirement.clone(),
                weight: spec.weight.max(1),
            })
            .collect();

        self.lifecycle
            .admit(&request, &reviewers, Actor::system())
            .await?;

        let recipients: Vec<String> = reviewers
            .iter()
            .map(|r| r.requirement.value().to_string())
            .collect();
        self.dispatcher
            .dispatch(
                request.id,
                self.dispatcher.default_channel(),
                NotificationEventKind::RequestCreated,
                &recipients,
                &format!("Oversight requested: {}", request.description),
                None,
            )
            .await;

        Ok(request)
    }

    /// Record one reviewer decision and apply the resulting transition.
    ///
    /// Failure ladder, each case distinct for the caller: `NotFound`,
    /// `AlreadyResolved`, `NotAuthorized`, `DuplicateDecision`,
    /// `ReasonRequired`.
    pub async fn decide(
        &self,
        request_id: Uuid,
        reviewer: &ReviewerRef,
        decision: DecisionKind,
        reason: Option<String>,
    ) -> Result<OversightRequest, OversightError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let request = self
            .repo
            .get(request_id)
            .await?
            .ok_or(OversightError::NotFound(request_id))?;
        if request.is_terminal() {
            return Err(OversightError::AlreadyResolved {
                id: request.id,
                status: request.status,
            });
        }

        let reviewers = self.repo.list_reviewers(request_id).await?;
        let matching: Vec<&RequiredReviewer> = reviewers
            .iter()
            .filter(|slot| slot.requirement.matches(reviewer))
            .collect();
        if matching.is_empty() {
            return Err(OversightError::NotAuthorized {
                reviewer_id: reviewer.id.clone(),
            });
        }

        let existing = self.repo.list_decisions(request_id).await?;
        if existing.iter().any(|d| d.reviewer_id == reviewer.id) {
            return Err(OversightError::DuplicateDecision {
                reviewer_id: reviewer.id.clone(),
            });
        }

        if decision == DecisionKind::Reject
            && reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(OversightError::ReasonRequired);
        }

        // Bind the decision to an unsatisfied slot, preferring an exact
        // user slot over a shared role slot. A reviewer whose slots are
        // all taken still decides, with the weight of their matched slot.
        let satisfied: HashSet<Uuid> = existing.iter().filter_map(|d| d.slot_id).collect();
        let slot = matching
            .iter()
            .find(|s| {
                matches!(s.requirement, ReviewerRequirement::User(_))
                    && !satisfied.contains(&s.id)
            })
            .or_else(|| matching.iter().find(|s| !satisfied.contains(&s.id)))
            .copied();
        let weight = slot.map_or(matching[0].weight, |s| s.weight);

        let mut row =
            ApprovalDecision::new(request_id, &reviewer.id, decision, weight, self.clock.now());
        if let Some(slot) = slot {
            row = row.with_slot(slot.id);
        }
        if let Some(ref reason) = reason {
            row = row.with_reason(reason.clone());
        }

        self.repo.insert_decision(&row).await.map_err(|e| match e {
            DatabaseError::DuplicateDecision { reviewer_id, .. } => {
                OversightError::DuplicateDecision { reviewer_id }
            }
            other => other.into(),
        })?;

        // Recompute the verdict from the now-complete decision set.
        let decisions = self.repo.list_decisions(request_id).await?;
        let verdict = DecisionAggregator::evaluate(&reviewers, &decisions, &request.policy);
        let actor = Actor::user(&reviewer.id);

        let updated = match verdict {
            Verdict::Approved => {
                self.lifecycle
                    .transition(
                        &request,
                        RequestStatus::Approved,
                        actor,
                        Some("quorum satisfied".to_string()),
                    )
                    .await?
            }
            Verdict::Rejected => {
                let why = reason
                    .clone()
                    .unwrap_or_else(|| "quorum rejected".to_string());
                self.lifecycle
                    .transition(&request, RequestStatus::Rejected, actor, Some(why))
                    .await?
            }
            Verdict::Pending => {
                if decision == DecisionKind::Escalate
                    && request.can_transition_to(RequestStatus::Escalated)
                {
                    self.lifecycle
                        .transition(
                            &request,
                            RequestStatus::Escalated,
                            actor,
                            Some("reviewer requested escalation".to_string()),
                        )
                        .await?
                } else if request.policy.track_in_review
                    && request.status == RequestStatus::Pending
                {
                    self.lifecycle
                        .transition(&request, RequestStatus::InReview, actor, None)
                        .await?
                } else {
                    request.clone()
                }
            }
        };

        self.dispatcher
            .dispatch(
                request_id,
                self.dispatcher.default_channel(),
                NotificationEventKind::DecisionRecorded,
                &[updated.agent_id.clone()],
                &format!("{} recorded {}", reviewer.id, decision.as_str()),
                Some(reviewer.id.as_str()),
            )
            .await;

        if updated.is_terminal() {
            self.prune_lock(request_id);
        }
        Ok(updated)
    }

    /// Cancel a non-terminal request.
    pub async fn cancel(
        &self,
        request_id: Uuid,
        actor_id: &str,
        reason: impl Into<String>,
    ) -> Result<OversightRequest, OversightError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let request = self
            .repo
            .get(request_id)
            .await?
            .ok_or(OversightError::NotFound(request_id))?;
        if request.is_terminal() {
            return Err(OversightError::AlreadyResolved {
                id: request.id,
                status: request.status,
            });
        }

        let updated = self
            .lifecycle
            .transition(
                &request,
                RequestStatus::Cancelled,
                Actor::user(actor_id),
                Some(reason.into()),
            )
            .await?;
        self.prune_lock(request_id);
        Ok(updated)
    }

    /// Expire an overdue request. Monitor entry point; tolerates being
    /// invoked repeatedly for the same deadline. Returns whether a
    /// transition was applied.
    pub async fn expire(&self, request_id: Uuid) -> Result<bool, OversightError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let Some(request) = self.repo.get(request_id).await? else {
            return Ok(false);
        };
        if !request.is_overdue(self.clock.now()) {
            // Already resolved, or a decision landed before the sweep.
            return Ok(false);
        }

        self.lifecycle
            .transition(
                &request,
                RequestStatus::Expired,
                Actor::system(),
                Some("approval timeout reached".to_string()),
            )
            .await?;
        self.prune_lock(request_id);
        Ok(true)
    }

    /// Apply one escalation rule to a request. Monitor entry point;
    /// idempotent per (rule, request) via the persisted firing record.
    /// Returns whether the rule fired.
    pub async fn apply_escalation(
        &self,
        request_id: Uuid,
        rule: &EscalationRule,
    ) -> Result<bool, OversightError> {
        let lock = self.lock_for(request_id);
        let _guard = lock.lock().await;

        let Some(request) = self.repo.get(request_id).await? else {
            return Ok(false);
        };
        if request.is_terminal() {
            return Ok(false);
        }

        let now = self.clock.now();
        if !self.policies.record_firing(rule.id, request_id, now).await? {
            return Ok(false);
        }

        if request.can_transition_to(RequestStatus::Escalated) {
            self.lifecycle
                .transition(
                    &request,
                    RequestStatus::Escalated,
                    Actor::system(),
                    Some(format!("escalation rule {}", rule.name)),
                )
                .await?;
        }

        self.dispatcher
            .dispatch(
                request_id,
                &rule.channel,
                NotificationEventKind::Escalated,
                &[rule.target.value().to_string()],
                &format!("Escalated: {}", request.description),
                Some(rule.name.as_str()),
            )
            .await;

        Ok(true)
    }

    /// Get a request by ID.
    pub async fn get(&self, request_id: Uuid) -> Result<Option<OversightRequest>, OversightError> {
        Ok(self.repo.get(request_id).await?)
    }

    /// List open requests.
    pub async fn list_pending(
        &self,
        filters: PendingFilters,
    ) -> Result<Vec<OversightRequest>, OversightError> {
        Ok(self.repo.list_pending(filters).await?)
    }

    /// Decisions recorded for a request, oldest first.
    pub async fn decisions(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ApprovalDecision>, OversightError> {
        Ok(self.repo.list_decisions(request_id).await?)
    }

    /// Audit trail for a request, oldest first. The subscription surface
    /// for external renderers.
    pub async fn history(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<StateTransition>, OversightError> {
        self.lifecycle.history(request_id).await
    }

    fn build_request(
        admission: &AdmissionRequest,
        policy: QuorumConfig,
        now: chrono::DateTime<chrono::Utc>,
    ) -> OversightRequest {
        let mut request = OversightRequest::new(
            &admission.organization_id,
            &admission.agent_id,
            admission.action_type,
            &admission.description,
            admission.risk.clone(),
            policy,
            now,
        )
        .with_action_data(admission.action_data.clone())
        .with_priority(admission.priority);
        request.justification = admission.justification.clone();
        request.amount = admission.amount;
        request.resource = admission.resource.clone();
        request
    }
}
