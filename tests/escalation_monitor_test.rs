//! Escalation rule firing, idempotency, and monitor recovery.

mod common;

use chrono::Duration;

use vigil::domain::models::{
    ActionType, DecisionKind, EscalationRule, EscalationTarget, NotificationEventKind,
    QuorumConfig, RequestStatus, ReviewerRef,
};
use vigil::domain::ports::{NotificationHistory, PolicyStore};
use vigil::services::{EscalationMonitor, EscalationMonitorConfig};

fn compliance_rule(org: &str, after_secs: u64) -> EscalationRule {
    EscalationRule::new(
        org,
        "page-compliance",
        after_secs,
        EscalationTarget::Role("compliance".to_string()),
        "log",
    )
}

#[tokio::test]
async fn rule_fires_once_and_notifies_target() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;
    engine
        .policies
        .upsert_escalation_rule(&compliance_rule("acme", 600))
        .await
        .unwrap();

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    // Not due yet.
    engine.monitor.tick().await;
    let still_pending = engine.service.get(request.id).await.unwrap().unwrap();
    assert_eq!(still_pending.status, RequestStatus::Pending);

    engine.clock.advance(Duration::seconds(601));
    engine.monitor.tick().await;

    let escalated = engine.service.get(request.id).await.unwrap().unwrap();
    assert_eq!(escalated.status, RequestStatus::Escalated);

    let escalation_sends: Vec<_> = engine
        .channel
        .sent()
        .into_iter()
        .filter(|(_, kind)| *kind == NotificationEventKind::Escalated)
        .collect();
    assert_eq!(escalation_sends.len(), 1);
    assert_eq!(escalation_sends[0].0, "compliance");

    // Later ticks must not re-fire the rule or re-notify.
    engine.monitor.tick().await;
    engine.monitor.tick().await;

    let history = engine.service.history(request.id).await.unwrap();
    assert_eq!(
        history
            .iter()
            .filter(|t| t.to_status == RequestStatus::Escalated)
            .count(),
        1
    );
    let escalation_sends = engine
        .channel
        .sent()
        .into_iter()
        .filter(|(_, kind)| *kind == NotificationEventKind::Escalated)
        .count();
    assert_eq!(escalation_sends, 1);
}

#[tokio::test]
async fn independent_rules_fire_independently() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;
    engine
        .policies
        .upsert_escalation_rule(&compliance_rule("acme", 60))
        .await
        .unwrap();
    engine
        .policies
        .upsert_escalation_rule(&EscalationRule::new(
            "acme",
            "page-cto",
            600,
            EscalationTarget::User("cto".to_string()),
            "log",
        ))
        .await
        .unwrap();

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    engine.clock.advance(Duration::seconds(61));
    engine.monitor.tick().await;
    let recipients: Vec<String> = engine
        .channel
        .sent()
        .into_iter()
        .filter(|(_, kind)| *kind == NotificationEventKind::Escalated)
        .map(|(recipient, _)| recipient)
        .collect();
    assert_eq!(recipients, vec!["compliance".to_string()]);

    // The second rule fires later, even though the request is already
    // escalated; the status transition happens only once.
    engine.clock.advance(Duration::seconds(600));
    engine.monitor.tick().await;
    let recipients: Vec<String> = engine
        .channel
        .sent()
        .into_iter()
        .filter(|(_, kind)| *kind == NotificationEventKind::Escalated)
        .map(|(recipient, _)| recipient)
        .collect();
    assert_eq!(
        recipients,
        vec!["compliance".to_string(), "cto".to_string()]
    );

    let history = engine.service.history(request.id).await.unwrap();
    assert_eq!(
        history
            .iter()
            .filter(|t| t.to_status == RequestStatus::Escalated)
            .count(),
        1
    );
}

#[tokio::test]
async fn action_type_filter_limits_rule_scope() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(2),
    )
    .await;
    engine
        .policies
        .upsert_escalation_rule(
            &compliance_rule("acme", 60).with_action_type(ActionType::DataAccess),
        )
        .await
        .unwrap();

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();

    engine.clock.advance(Duration::seconds(120));
    engine.monitor.tick().await;

    let unchanged = engine.service.get(request.id).await.unwrap().unwrap();
    assert_eq!(
        unchanged.status,
        RequestStatus::Pending,
        "transaction request ignores a data_access-scoped rule"
    );
}

#[tokio::test]
async fn escalated_request_still_resolves_normally() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default").with_required_approvals(1),
    )
    .await;
    engine
        .policies
        .upsert_escalation_rule(&compliance_rule("acme", 60))
        .await
        .unwrap();

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();
    engine.clock.advance(Duration::seconds(61));
    engine.monitor.tick().await;

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
async fn expiry_sweep_covers_all_overdue_requests() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default")
            .with_required_approvals(2)
            .with_timeout_secs(30),
    )
    .await;

    let first = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();
    let second = engine
        .service
        .admit(common::two_role_admission("acme"))
        .await
        .unwrap();

    engine.clock.advance(Duration::seconds(31));
    engine.monitor.tick().await;

    for id in [first.id, second.id] {
        let request = engine.service.get(id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Expired);
    }
}

#[tokio::test]
async fn restarted_monitor_recovers_from_persisted_state() {
    let engine = common::engine().await;
    common::seed_quorum(
        &engine,
        &QuorumConfig::new("acme", "default")
            .with_required_approvals(2)
            .with_timeout_secs(3600),
    )
    .await;
    engine
        .policies
        .upsert_escalation_rule(&compliance_rule("acme", 60))
        .await
        .unwrap();

    let request = engine
        .service
        .admit(common::two_user_admission("acme"))
        .await
        .unwrap();
    engine.clock.advance(Duration::seconds(61));
    engine.monitor.tick().await;
    assert_eq!(
        engine
            .service
            .get(request.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        RequestStatus::Escalated
    );

    // A fresh monitor instance over the same store: the persisted firing
    // record keeps the rule from firing again, and the pending deadline is
    // still honored.
    let second_monitor = EscalationMonitor::new(
        engine.service.clone(),
        engine.repo.clone(),
        engine.policies.clone(),
        engine.clock.clone(),
        EscalationMonitorConfig::default(),
    );
    second_monitor.tick().await;

    let escalated_rows = engine
        .notifications
        .for_request(request.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.event_kind == NotificationEventKind::Escalated)
        .count();
    assert_eq!(escalated_rows, 1, "no duplicate escalation after restart");

    engine.clock.advance(Duration::seconds(3600));
    second_monitor.tick().await;
    assert_eq!(
        engine
            .service
            .get(request.id)
            .await
            .unwrap()
            .unwrap()
            .status,
        RequestStatus::Expired
    );
}

#[tokio::test]
async fn monitor_loop_starts_and_stops() {
    let engine = common::engine().await;
    let handle = engine.monitor.start();
    assert!(engine.monitor.is_running());

    engine.monitor.stop();
    assert!(!engine.monitor.is_running());
    // The loop observes the flag on its next wakeup.
    let _ = tokio::time::timeout(std::time::Duration::from_millis(200), handle).await;
}
