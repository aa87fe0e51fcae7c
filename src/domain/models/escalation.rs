//! Escalation rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::ActionType;

/// Who an escalation notifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EscalationTarget {
    Role(String),
    User(String),
}

impl EscalationTarget {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Role(_) => "role",
            Self::User(_) => "user",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Role(v) | Self::User(v) => v,
        }
    }

    pub fn from_parts(kind: &str, value: &str) -> Option<Self> {
        match kind {
            "role" => Some(Self::Role(value.to_string())),
            "user" => Some(Self::User(value.to_string())),
            _ => None,
        }
    }
}

/// Organization-scoped escalation rule. Multiple rules may apply to one
/// request; each fires independently, at most once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: Uuid,
    pub organization_id: String,
    pub name: String,
    /// Delay after request creation before the rule fires.
    pub trigger_after_secs: u64,
    pub target: EscalationTarget,
    /// Notification channel name for the escalation notice.
    pub channel: String,
    /// When set, the rule only applies to this action type.
    pub action_type: Option<ActionType>,
    pub enabled: bool,
}

impl EscalationRule {
    pub fn new(
        organization_id: impl Into<String>,
        name: impl Into<String>,
        trigger_after_secs: u64,
        target: EscalationTarget,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            name: name.into(),
            trigger_after_secs,
            target,
            channel: channel.into(),
            action_type: None,
            enabled: true,
        }
    }

    pub fn with_action_type(mut self, action_type: ActionType) -> Self {
        self.action_type = Some(action_type);
        self
    }

    /// Whether the rule's delay has elapsed for a request created at
    /// `created_at`.
    pub fn is_due(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now >= created_at + Duration::seconds(self.trigger_after_secs as i64)
    }

    /// Whether the rule covers this action type.
    pub fn covers(&self, action_type: ActionType) -> bool {
        self.enabled && self.action_type.map_or(true, |t| t == action_type)
    }
}
