//! End-to-end oversight flows against the in-memory stack.

mod common;

use chrono::Duration;
use rust_decimal::Decimal;

use vigil::domain::models::{
    ActionType, ActorKind, AutoApprovalRule, DecisionKind, NotificationEventKind, QuorumConfig,
    RequestStatus, ReviewerRef, RiskAssessment, RiskLevel,
};
use vigil::domain::ports::{NotificationHistory, PendingFilters, PolicyStore, RequestRepository};
use vigil::services::{AdmissionRequest, ReviewerSpec};
use vigil::OversightError;

fn physician() -> ReviewerRef {
    ReviewerRef::new("dr-chen").with_role("physician")
}

fn pharmacist() -> ReviewerRef {
    ReviewerRef::new("rx-patel").with_role("pharmacist")
}

#[tokio::test]
async fn two_approvals_resolve_to_approved() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_role_admission("acme"))
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert!(request.resolved_at.is_none());

    // First approval: 1 of 2, still pending.
    let after_first = engine
        .service
        .decide(request.id, &physician(), DecisionKind::Approve, None)
        .await
        .unwrap();
    assert_eq!(after_first.status, RequestStatus::Pending);

    // Second approval reaches quorum.
    let after_second = engine
        .service
        .decide(request.id, &pharmacist(), DecisionKind::Approve, None)
        .await
        .unwrap();
    assert_eq!(after_second.status, RequestStatus::Approved);
    assert!(after_second.resolved_at.is_some());

    let decisions = engine.service.decisions(request.id).await.unwrap();
    assert_eq!(decisions.len(), 2);

    // Exactly two audit rows: creation and resolution.
    let history = engine.service.history(request.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from_status, None);
    assert_eq!(history[0].to_status, RequestStatus::Pending);
    assert_eq!(history[0].actor.kind, ActorKind::System);
    assert_eq!(history[1].from_status, Some(RequestStatus::Pending));
    assert_eq!(history[1].to_status, RequestStatus::Approved);
    assert_eq!(history[1].actor.kind, ActorKind::User);
    assert_eq!(history.iter().filter(|t| t.is_terminal_entry()).count(), 1);
}

#[tokio::test]
async fn any_rejection_rejects_immediately() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_role_admission("acme"))
        .await
        .unwrap();

    let rejected = engine
        .service
        .decide(
            request.id,
            &pharmacist(),
            DecisionKind::Reject,
            Some("interaction risk too high".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);

    // The physician's later approval attempt hits the resolved request.
    let err = engine
        .service
        .decide(request.id, &physician(), DecisionKind::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OversightError::AlreadyResolved { .. }));
    assert!(err.is_conflict());

    let decisions = engine.service.decisions(request.id).await.unwrap();
    assert_eq!(decisions.len(), 1, "no decision row for the late approval");
}

#[tokio::test]
async fn timeout_expires_request_and_blocks_decisions() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default")
            .with_required_approvals(2)
            .with_timeout_secs(60),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_role_admission("acme"))
        .await
        .unwrap();
    assert!(request.timeout_at.is_some());

    engine.clock.advance(Duration::seconds(61));
    engine.monitor.tick().await;

    let expired = engine.service.get(request.id).await.unwrap().unwrap();
    assert_eq!(expired.status, RequestStatus::Expired);
    assert!(expired.resolved_at.is_some());

    let err = engine
        .service
        .decide(request.id, &physician(), DecisionKind::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OversightError::AlreadyResolved { .. }));
}

#[tokio::test]
async fn auto_approval_bypasses_reviewers_and_notifications() {
    let engine = common::engine().await;
    engine
        .policies
        .insert_auto_approval(
            &AutoApprovalRule::new("acme", ActionType::Transaction)
                .with_max_amount(Decimal::new(10_000, 0)),
        )
        .await
        .unwrap();

    let admission = AdmissionRequest::new(
        "acme",
        "trade-agent",
        ActionType::Transaction,
        "Buy 5 AAPL",
        RiskAssessment::new(0.1, RiskLevel::Low),
    )
    .with_amount(Decimal::new(500, 0));

    let request = engine.service.admit(admission).await.unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
    assert!(request.auto_approval_attempted);
    assert!(request.resolved_at.is_some());

    // No reviewer slots, no notifications of any kind.
    let reviewers = engine.repo.list_reviewers(request.id).await.unwrap();
    assert!(reviewers.is_empty());
    assert!(engine.channel.sent().is_empty());

    // Single audit row: straight into the terminal state, by policy.
    let history = engine.service.history(request.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].to_status, RequestStatus::Approved);
    assert_eq!(history[0].actor.kind, ActorKind::Policy);
}

#[tokio::test]
async fn elevated_risk_disables_auto_approval() {
    let engine = common::engine().await;
    engine
        .policies
        .insert_auto_approval(
            &AutoApprovalRule::new("acme", ActionType::Transaction)
                .with_max_amount(Decimal::new(10_000, 0)),
        )
        .await
        .unwrap();
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(1),
    )
    .await;

    let admission = AdmissionRequest::new(
        "acme",
        "trade-agent",
        ActionType::Transaction,
        "Buy 5 AAPL",
        RiskAssessment::new(0.95, RiskLevel::High).with_factor("velocity anomaly"),
    )
    .with_amount(Decimal::new(500, 0))
    .with_reviewer(ReviewerSpec::user("alice"));

    let request = engine.service.admit(admission).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert!(!request.auto_approval_attempted);
}

#[tokio::test]
async fn unauthorized_reviewer_writes_nothing() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_role_admission("acme"))
        .await
        .unwrap();

    let outsider = ReviewerRef::new("mallory").with_role("intern");
    let err = engine
        .service
        .decide(request.id, &outsider, DecisionKind::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OversightError::NotAuthorized { .. }));

    assert!(engine.service.decisions(request.id).await.unwrap().is_empty());
    assert_eq!(engine.service.history(request.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejection_without_reason_is_refused() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_role_admission("acme"))
        .await
        .unwrap();

    for reason in [None, Some("   ".to_string())] {
        let err = engine
            .service
            .decide(request.id, &physician(), DecisionKind::Reject, reason)
            .await
            .unwrap_err();
        assert!(matches!(err, OversightError::ReasonRequired));
    }
    assert!(engine.service.decisions(request.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn admission_fails_without_matching_policy() {
    let engine = common::engine().await;

    let err = engine
        .service
        .admit(common::two_role_admission("no-such-org"))
        .await
        .unwrap_err();
    assert!(matches!(err, OversightError::PolicyNotFound { .. }));

    // Nothing was persisted.
    assert!(engine.repo.list_open().await.unwrap().is_empty());
}

#[tokio::test]
async fn policy_snapshot_survives_later_edits() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(1),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    // Tighten the stored policy after admission; the in-flight request
    // keeps the snapshot it was admitted under.
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(99),
    )
    .await;

    let approved = engine
        .service
        .decide(
            request.id,
            &ReviewerRef::new("alice"),
            DecisionKind::Approve,
            None,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
}

#[tokio::test]
async fn cancellation_is_terminal() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    let cancelled = engine
        .service
        .cancel(request.id, "trade-agent", "superseded by new order")
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert!(cancelled.resolved_at.is_some());

    let err = engine
        .service
        .decide(
            request.id,
            &ReviewerRef::new("alice"),
            DecisionKind::Approve,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OversightError::AlreadyResolved { .. }));

    let err = engine
        .service
        .cancel(request.id, "trade-agent", "again")
        .await
        .unwrap_err();
    assert!(matches!(err, OversightError::AlreadyResolved { .. }));
}

#[tokio::test]
async fn in_review_intermediate_state_when_policy_tracks_it() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default")
            .with_required_approvals(2)
            .with_track_in_review(true),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    let after_first = engine
        .service
        .decide(
            request.id,
            &ReviewerRef::new("alice"),
            DecisionKind::Approve,
            None,
        )
        .await
        .unwrap();
    assert_eq!(after_first.status, RequestStatus::InReview);

    let after_second = engine
        .service
        .decide(
            request.id,
            &ReviewerRef::new("bob"),
            DecisionKind::Approve,
            None,
        )
        .await
        .unwrap();
    assert_eq!(after_second.status, RequestStatus::Approved);

    let history = engine.service.history(request.id).await.unwrap();
    let statuses: Vec<RequestStatus> = history.iter().map(|t| t.to_status).collect();
    assert_eq!(
        statuses,
        vec![
            RequestStatus::Pending,
            RequestStatus::InReview,
            RequestStatus::Approved
        ]
    );
}

#[tokio::test]
async fn escalate_vote_moves_request_to_escalated() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(1),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    let escalated = engine
        .service
        .decide(
            request.id,
            &ReviewerRef::new("alice"),
            DecisionKind::Escalate,
            None,
        )
        .await
        .unwrap();
    assert_eq!(escalated.status, RequestStatus::Escalated);

    // The request still resolves normally from escalated.
    let approved = engine
        .service
        .decide(
            request.id,
            &ReviewerRef::new("bob"),
            DecisionKind::Approve,
            None,
        )
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
}

#[tokio::test]
async fn list_pending_filters_by_agent_and_status() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let first = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();
    let mut second_admission = common::two_user_admission("acme");
    second_admission.agent_id = "billing-agent".to_string();
    let second = engine.service.admit(second_admission).await.unwrap();

    let all = engine
        .service
        .list_pending(PendingFilters::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let billing_only = engine
        .service
        .list_pending(PendingFilters {
            agent_id: Some("billing-agent".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(billing_only.len(), 1);
    assert_eq!(billing_only[0].id, second.id);

    // Resolved requests drop out of the pending listing.
    engine
        .service
        .cancel(first.id, "trade-agent", "changed plan")
        .await
        .unwrap();
    let remaining = engine
        .service
        .list_pending(PendingFilters::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn reviewer_notifications_follow_admission() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    let sent = engine.channel.sent();
    let created: Vec<_> = sent
        .iter()
        .filter(|(_, kind)| *kind == NotificationEventKind::RequestCreated)
        .collect();
    assert_eq!(created.len(), 2, "both reviewers notified");

    let records = engine.notifications.for_request(request.id).await.unwrap();
    assert_eq!(records.len(), 1, "one dispatch outcome row per event");
}
