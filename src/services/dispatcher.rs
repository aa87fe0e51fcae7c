//! Notification dispatch with idempotency and retry.
//!
//! The engine calls the dispatcher once per notifiable event. Dispatch is
//! keyed by a deterministic idempotency key, so a retried call after a
//! transient failure never produces a duplicate human-visible
//! notification. Delivery failures are recorded and logged, never
//! propagated into the state transition that triggered them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::config::NotificationConfig;
use crate::domain::models::{
    idempotency_key, DeliveryReceipt, DeliveryStatus, NotificationEvent, NotificationEventKind,
    NotificationRecord,
};
use crate::domain::ports::{Clock, NotificationChannel, NotificationHistory};

/// Retry policy with exponential backoff for channel deliveries.
///
/// Backoff doubles per retry, capped at `max_backoff_ms`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1_u64 << attempt.min(16))
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Routes engine events to named notification channels.
pub struct NotificationDispatcher {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    history: Arc<dyn NotificationHistory>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    default_channel: String,
}

impl NotificationDispatcher {
    pub fn new(
        history: Arc<dyn NotificationHistory>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            channels: HashMap::new(),
            history,
            clock,
            retry,
            default_channel: "log".to_string(),
        }
    }

    /// Register a channel. The last channel registered under a name wins.
    pub fn register_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        self.channels.insert(channel.name().to_string(), channel);
    }

    pub fn with_default_channel(mut self, name: impl Into<String>) -> Self {
        self.default_channel = name.into();
        self
    }

    pub fn default_channel(&self) -> &str {
        &self.default_channel
    }

    /// Dispatch one event to `recipients` over `channel`.
    ///
    /// `scope` feeds the idempotency key for event kinds that legitimately
    /// repeat per request (one per decision, one per escalation rule).
    /// Returns a receipt; a `Failed` receipt means retries were exhausted
    /// or the channel is unknown, and the outcome has been recorded either
    /// way.
    pub async fn dispatch(
        &self,
        request_id: Uuid,
        channel: &str,
        kind: NotificationEventKind,
        recipients: &[String],
        summary: &str,
        scope: Option<&str>,
    ) -> DeliveryReceipt {
        let key = idempotency_key(request_id, kind, channel, scope);

        // A delivered key is final; the retried caller gets a receipt and
        // no human sees the event twice.
        match self.history.find_by_key(&key).await {
            Ok(Some(record)) if record.status == DeliveryStatus::Delivered => {
                debug!(key = %key, "notification suppressed by idempotency key");
                return DeliveryReceipt::duplicate(key);
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "notification history lookup failed"),
        }

        let event = NotificationEvent {
            request_id,
            kind,
            summary: summary.to_string(),
        };

        let (status, error, attempts) = match self.channels.get(channel) {
            None => (
                DeliveryStatus::Failed,
                Some(format!("unknown channel {channel:?}")),
                0,
            ),
            Some(transport) => self.deliver_with_retry(transport, recipients, &event).await,
        };

        if let Some(ref message) = error {
            warn!(
                request_id = %request_id,
                channel,
                kind = kind.as_str(),
                error = %message,
                "notification delivery failed"
            );
        }

        let record = NotificationRecord {
            id: Uuid::new_v4(),
            request_id,
            channel: channel.to_string(),
            event_kind: kind,
            recipients: recipients.to_vec(),
            idempotency_key: key.clone(),
            status,
            error: error.clone(),
            attempts,
            created_at: self.clock.now(),
        };
        if let Err(e) = self.history.record(&record).await {
            warn!(key = %key, error = %e, "failed to record notification outcome");
        }

        DeliveryReceipt {
            idempotency_key: key,
            status,
            error,
            attempts,
        }
    }

    async fn deliver_with_retry(
        &self,
        transport: &Arc<dyn NotificationChannel>,
        recipients: &[String],
        event: &NotificationEvent,
    ) -> (DeliveryStatus, Option<String>, u32) {
        let mut last_error = None;
        let mut attempts = 0;

        while attempts <= self.retry.max_retries {
            if attempts > 0 {
                sleep(self.retry.backoff_for(attempts - 1)).await;
            }
            attempts += 1;

            let mut failed = None;
            for recipient in recipients {
                if let Err(e) = transport.send(recipient, event).await {
                    failed = Some(e.to_string());
                    break;
                }
            }

            match failed {
                None => return (DeliveryStatus::Delivered, None, attempts),
                Some(e) => last_error = Some(e),
            }
        }

        (DeliveryStatus::Failed, last_error, attempts)
    }
}
