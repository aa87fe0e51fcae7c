//! Shared test harness: in-memory engine stack with a manual clock and a
//! recording notification channel.

#![allow(dead_code)]

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use vigil::domain::models::{
    ActionType, NotificationEvent, NotificationEventKind, QuorumConfig, RiskAssessment,
    RiskLevel,
};
use vigil::domain::ports::notifier::{ChannelError, NotificationChannel};
use vigil::domain::ports::{ManualClock, PolicyStore};
use vigil::infrastructure::database::{
    AuditLogImpl, DatabaseConnection, NotificationHistoryImpl, PolicyStoreImpl,
    RequestRepositoryImpl,
};
use vigil::services::{
    AdmissionRequest, EscalationMonitor, EscalationMonitorConfig, NotificationDispatcher,
    OversightService, RequestLifecycle, RetryPolicy, ReviewerSpec,
};

/// Notification channel that records every send.
pub struct RecordingChannel {
    name: String,
    pub sends: StdMutex<Vec<(String, NotificationEventKind)>>,
}

impl RecordingChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sends: StdMutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, NotificationEventKind)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, recipient: &str, event: &NotificationEvent) -> Result<(), ChannelError> {
        self.sends
            .lock()
            .unwrap()
            .push((recipient.to_string(), event.kind));
        Ok(())
    }
}

pub struct TestEngine {
    pub service: Arc<OversightService>,
    pub monitor: Arc<EscalationMonitor>,
    pub repo: Arc<RequestRepositoryImpl>,
    pub policies: Arc<PolicyStoreImpl>,
    pub notifications: Arc<NotificationHistoryImpl>,
    pub clock: Arc<ManualClock>,
    pub channel: Arc<RecordingChannel>,
    pub db: DatabaseConnection,
}

/// Build a full engine stack against a fresh in-memory database.
pub async fn engine() -> TestEngine {
    let db = DatabaseConnection::in_memory()
        .await
        .expect("failed to open in-memory database");
    db.migrate().await.expect("failed to run migrations");
    let pool = db.pool().clone();

    let repo = Arc::new(RequestRepositoryImpl::new(pool.clone()));
    let policies = Arc::new(PolicyStoreImpl::new(pool.clone()));
    let audit = Arc::new(AuditLogImpl::new(pool.clone()));
    let notifications = Arc::new(NotificationHistoryImpl::new(pool));
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let channel = Arc::new(RecordingChannel::new("log"));

    let mut dispatcher = NotificationDispatcher::new(
        notifications.clone(),
        clock.clone(),
        RetryPolicy {
            max_retries: 1,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        },
    );
    dispatcher.register_channel(channel.clone());
    let dispatcher = Arc::new(dispatcher);

    let lifecycle = RequestLifecycle::new(repo.clone(), audit, clock.clone());
    let service = Arc::new(OversightService::new(
        repo.clone(),
        policies.clone(),
        lifecycle,
        dispatcher,
        clock.clone(),
    ));
    let monitor = Arc::new(EscalationMonitor::new(
        service.clone(),
        repo.clone(),
        policies.clone(),
        clock.clone(),
        EscalationMonitorConfig {
            tick_interval_ms: 10,
        },
    ));

    TestEngine {
        service,
        monitor,
        repo,
        policies,
        notifications,
        clock,
        channel,
        db,
    }
}

/// Upsert a quorum policy for `org`.
pub async fn seed_quorum(engine: &TestEngine, config: &QuorumConfig) {
    engine
        .policies
        .upsert_quorum(config)
        .await
        .expect("failed to seed quorum policy");
}

/// Basic two-reviewer admission: physician + pharmacist roles.
pub fn two_role_admission(org: &str) -> AdmissionRequest {
    AdmissionRequest::new(
        org,
        "trade-agent",
        ActionType::Transaction,
        "Buy 100 AAPL at market",
        RiskAssessment::new(0.6, RiskLevel::Medium),
    )
    .with_amount(Decimal::new(50_000, 0))
    .with_reviewer(ReviewerSpec::role("physician"))
    .with_reviewer(ReviewerSpec::role("pharmacist"))
}

/// Two named reviewers, alice and bob.
pub fn two_user_admission(org: &str) -> AdmissionRequest {
    AdmissionRequest::new(
        org,
        "trade-agent",
        ActionType::Transaction,
        "Wire 25k to vendor",
        RiskAssessment::new(0.5, RiskLevel::Medium),
    )
    .with_amount(Decimal::new(25_000, 0))
    .with_reviewer(ReviewerSpec::user("alice"))
    .with_reviewer(ReviewerSpec::user("bob"))
}
