//! Append-only audit records of state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::RequestStatus;

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Engine-internal: admission, expiry sweep, escalation rules.
    System,
    /// A human reviewer or submitter.
    User,
    /// Automatic policy evaluation (auto-approval).
    Policy,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Policy => "policy",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "policy" => Some(Self::Policy),
            _ => None,
        }
    }
}

/// Transition actor: kind plus an id for human actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    pub id: Option<String>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            kind: ActorKind::System,
            id: None,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: ActorKind::User,
            id: Some(id.into()),
        }
    }

    pub fn policy() -> Self {
        Self {
            kind: ActorKind::Policy,
            id: None,
        }
    }
}

/// One audit row. Rows are appended on every status change and never
/// updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub id: Uuid,
    pub request_id: Uuid,
    /// `None` for the admission row.
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    pub actor: Actor,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StateTransition {
    pub fn new(
        request_id: Uuid,
        from_status: Option<RequestStatus>,
        to_status: RequestStatus,
        actor: Actor,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            from_status,
            to_status,
            actor,
            reason: None,
            created_at,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether this row records entry into a terminal state.
    pub fn is_terminal_entry(&self) -> bool {
        self.to_status.is_terminal()
    }
}
