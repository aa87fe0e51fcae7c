//! Reviewer bindings and recorded decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a required-reviewer slot matches against: a specific user or any
/// holder of a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReviewerRequirement {
    User(String),
    Role(String),
}

impl ReviewerRequirement {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Role(_) => "role",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::User(v) | Self::Role(v) => v,
        }
    }

    pub fn from_parts(kind: &str, value: &str) -> Option<Self> {
        match kind {
            "user" => Some(Self::User(value.to_string())),
            "role" => Some(Self::Role(value.to_string())),
            _ => None,
        }
    }

    /// Whether a reviewer satisfies this slot.
    pub fn matches(&self, reviewer: &ReviewerRef) -> bool {
        match self {
            Self::User(id) => reviewer.id == *id,
            Self::Role(role) => reviewer.roles.iter().any(|r| r == role),
        }
    }
}

/// Identity of a deciding reviewer, asserted by the authenticating caller.
/// The engine holds no user directory; roles arrive with the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerRef {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl ReviewerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Binds a request to one reviewer slot eligible to decide on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredReviewer {
    pub id: Uuid,
    pub request_id: Uuid,
    pub requirement: ReviewerRequirement,
    /// Weight a decision from this slot carries; also the weight assumed
    /// for reachability while the slot is undecided.
    pub weight: u32,
}

impl RequiredReviewer {
    pub fn user(request_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            requirement: ReviewerRequirement::User(user_id.into()),
            weight: 1,
        }
    }

    pub fn role(request_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            requirement: ReviewerRequirement::Role(role.into()),
            weight: 1,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }
}

/// A reviewer's verdict on one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    Abstain,
    RequestInfo,
    Escalate,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Abstain => "abstain",
            Self::RequestInfo => "request_info",
            Self::Escalate => "escalate",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            "abstain" => Some(Self::Abstain),
            "request_info" => Some(Self::RequestInfo),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }

    /// Whether this decision contributes weight toward either side of the
    /// quorum. Abstain, request-info, and escalate votes satisfy a slot
    /// without moving the tally.
    pub fn carries_weight(&self) -> bool {
        matches!(self, Self::Approve | Self::Reject)
    }
}

/// One recorded decision. At most one per (request, reviewer): a reviewer
/// never decides twice and a later call is rejected, not overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub id: Uuid,
    pub request_id: Uuid,
    pub reviewer_id: String,
    /// The required-reviewer slot this decision satisfies. `None` for an
    /// extra decision from a reviewer whose matching role slot was already
    /// satisfied by someone else.
    pub slot_id: Option<Uuid>,
    pub decision: DecisionKind,
    pub weight: u32,
    pub reason: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ApprovalDecision {
    pub fn new(
        request_id: Uuid,
        reviewer_id: impl Into<String>,
        decision: DecisionKind,
        weight: u32,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            reviewer_id: reviewer_id.into(),
            slot_id: None,
            decision,
            weight: weight.max(1),
            reason: None,
            decided_at,
        }
    }

    pub fn with_slot(mut self, slot_id: Uuid) -> Self {
        self.slot_id = Some(slot_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
