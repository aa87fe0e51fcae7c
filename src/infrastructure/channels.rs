//! Built-in notification channel adapters.
//!
//! Real transports (email, SMS, Slack, pagers) live outside the engine and
//! plug in through [`NotificationChannel`]. The in-repo default emits
//! structured log events, which is enough for local operation and tests.

use async_trait::async_trait;
use tracing::info;

use crate::domain::models::NotificationEvent;
use crate::domain::ports::notifier::{ChannelError, NotificationChannel};

/// Channel that emits each notification as a tracing event.
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, recipient: &str, event: &NotificationEvent) -> Result<(), ChannelError> {
        info!(
            channel = %self.name,
            recipient,
            request_id = %event.request_id,
            kind = event.kind.as_str(),
            summary = %event.summary,
            "notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::NotificationEventKind;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_log_channel_delivers() {
        let channel = LogChannel::default();
        let event = NotificationEvent {
            request_id: Uuid::new_v4(),
            kind: NotificationEventKind::RequestCreated,
            summary: "Review requested".to_string(),
        };
        assert!(channel.send("alice", &event).await.is_ok());
        assert_eq!(channel.name(), "log");
    }
}
