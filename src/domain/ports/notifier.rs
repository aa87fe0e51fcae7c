use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::{NotificationEvent, NotificationRecord};
use crate::infrastructure::database::DatabaseError;

/// Transport-level delivery failure. Transports are external collaborators;
/// the engine only sees success or this error.
#[derive(Error, Debug)]
#[error("Delivery via {channel} failed: {message}")]
pub struct ChannelError {
    pub channel: String,
    pub message: String,
}

impl ChannelError {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// One notification transport (email, SMS, Slack, pager, ...). Delivery is
/// invoked by the dispatcher, never directly by the engine services.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name used in escalation rules and idempotency keys.
    fn name(&self) -> &str;

    /// Deliver one event to one recipient.
    async fn send(&self, recipient: &str, event: &NotificationEvent) -> Result<(), ChannelError>;
}

/// Persisted dispatch outcomes, unique per idempotency key.
#[async_trait]
pub trait NotificationHistory: Send + Sync {
    /// Look up a prior dispatch by idempotency key.
    async fn find_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<NotificationRecord>, DatabaseError>;

    /// Record a dispatch outcome (insert or replace by key).
    async fn record(&self, record: &NotificationRecord) -> Result<(), DatabaseError>;

    /// All recorded dispatches for a request, oldest first.
    async fn for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, DatabaseError>;
}
