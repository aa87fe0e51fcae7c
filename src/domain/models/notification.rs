//! Notification events and delivery receipts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of human-visible event the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEventKind {
    RequestCreated,
    Reminder,
    DecisionRecorded,
    Escalated,
}

impl NotificationEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestCreated => "request_created",
            Self::Reminder => "reminder",
            Self::DecisionRecorded => "decision_recorded",
            Self::Escalated => "escalated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "request_created" => Some(Self::RequestCreated),
            "reminder" => Some(Self::Reminder),
            "decision_recorded" => Some(Self::DecisionRecorded),
            "escalated" => Some(Self::Escalated),
            _ => None,
        }
    }
}

/// Payload handed to a notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub request_id: Uuid,
    pub kind: NotificationEventKind,
    /// Short human-readable summary for the recipient.
    pub summary: String,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
    /// Suppressed: the idempotency key was already delivered.
    Duplicate,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Receipt returned by the dispatcher. Failures carry the last error but
/// never roll back the state change that triggered the notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub idempotency_key: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub attempts: u32,
}

impl DeliveryReceipt {
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self {
            idempotency_key: key.into(),
            status: DeliveryStatus::Duplicate,
            error: None,
            attempts: 0,
        }
    }
}

/// Persisted record of a dispatch outcome, unique per idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub request_id: Uuid,
    pub channel: String,
    pub event_kind: NotificationEventKind,
    pub recipients: Vec<String>,
    pub idempotency_key: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

/// Deterministic idempotency key: a retried dispatch for the same request,
/// event kind, and channel maps to the same key and is deduplicated.
/// `scope` distinguishes repeatable events of the same kind (one key per
/// recorded decision, one per escalation rule).
pub fn idempotency_key(
    request_id: Uuid,
    kind: NotificationEventKind,
    channel: &str,
    scope: Option<&str>,
) -> String {
    match scope {
        Some(scope) => format!("{}:{}:{}:{}", request_id, kind.as_str(), channel, scope),
        None => format!("{}:{}:{}", request_id, kind.as_str(), channel),
    }
}
