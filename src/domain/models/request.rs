//! Oversight request domain model.
//!
//! A request is one agent-proposed action held for human review. Its status
//! moves through a strict state machine; the transition table lives on
//! [`RequestStatus`] and every write goes through the lifecycle service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::QuorumConfig;

/// Status of an oversight request.
///
/// ```text
/// Pending → InReview → Escalated → Approved | Rejected | Expired | Cancelled
///         ↘ Escalated ↗
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting reviewer decisions.
    Pending,
    /// At least one decision recorded, verdict still open.
    InReview,
    /// An escalation rule fired or a reviewer voted to escalate.
    Escalated,
    /// Quorum reached; the action may proceed.
    Approved,
    /// Quorum rejected the action.
    Rejected,
    /// Timed out before a verdict.
    Expired,
    /// Withdrawn by the submitter or by system policy.
    Cancelled,
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Escalated => "escalated",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_review" => Some(Self::InReview),
            "escalated" => Some(Self::Escalated),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" | "timed_out" => Some(Self::Expired),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Expired | Self::Cancelled
        )
    }

    /// Check if the request is still eligible for decisions, escalation,
    /// and expiry.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<RequestStatus> {
        match self {
            Self::Pending => vec![
                Self::InReview,
                Self::Escalated,
                Self::Approved,
                Self::Rejected,
                Self::Expired,
                Self::Cancelled,
            ],
            Self::InReview => vec![
                Self::Escalated,
                Self::Approved,
                Self::Rejected,
                Self::Expired,
                Self::Cancelled,
            ],
            Self::Escalated => vec![
                Self::Approved,
                Self::Rejected,
                Self::Expired,
                Self::Cancelled,
            ],
            Self::Approved | Self::Rejected | Self::Expired | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Kind of action awaiting oversight. The engine routes on the tag only;
/// the payload stays opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Transaction,
    DataAccess,
    ExternalApi,
    CodeExecution,
    Communication,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::DataAccess => "data_access",
            Self::ExternalApi => "external_api",
            Self::CodeExecution => "code_execution",
            Self::Communication => "communication",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "transaction" => Some(Self::Transaction),
            "data_access" => Some(Self::DataAccess),
            "external_api" => Some(Self::ExternalApi),
            "code_execution" => Some(Self::CodeExecution),
            "communication" => Some(Self::Communication),
            _ => None,
        }
    }
}

/// Priority of a request, for reviewer queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Default for RequestPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl RequestPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Risk level supplied by the caller's risk assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Elevated levels disqualify a request from auto-approval.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Risk assessment attached to an admission. Supplied data; never computed
/// inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    #[serde(default)]
    pub factors: Vec<String>,
}

impl RiskAssessment {
    pub fn new(score: f64, level: RiskLevel) -> Self {
        Self {
            score,
            level,
            factors: Vec::new(),
        }
    }

    pub fn with_factor(mut self, factor: impl Into<String>) -> Self {
        self.factors.push(factor.into());
        self
    }
}

/// One agent-proposed action awaiting (or past) human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OversightRequest {
    /// Unique identifier
    pub id: Uuid,
    /// Owning organization
    pub organization_id: String,
    /// Agent that proposed the action
    pub agent_id: String,
    /// Action kind; the engine routes on this tag only
    pub action_type: ActionType,
    /// Opaque kind-specific payload
    pub action_data: serde_json::Value,
    /// Human-readable description of the action
    pub description: String,
    /// Business/clinical justification supplied by the agent
    pub justification: Option<String>,
    /// Declared monetary amount, used for policy tiering and auto-approval
    pub amount: Option<Decimal>,
    /// Declared resource (symbol, dataset, endpoint), used for auto-approval
    pub resource: Option<String>,
    /// Current status
    pub status: RequestStatus,
    /// Priority for reviewer queues
    pub priority: RequestPriority,
    /// Caller-supplied risk assessment
    pub risk: RiskAssessment,
    /// Quorum policy snapshot captured at admission; later policy edits
    /// never affect an in-flight request
    pub policy: QuorumConfig,
    /// Whether the auto-approval path resolved this request
    pub auto_approval_attempted: bool,
    /// When admitted
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// Deadline after which the request expires; immutable once set
    pub timeout_at: Option<DateTime<Utc>>,
    /// Set exactly when the request reaches a terminal state
    pub resolved_at: Option<DateTime<Utc>>,
    /// Version for optimistic locking
    pub version: u32,
}

impl OversightRequest {
    /// Create a new pending request. Timing fields are stamped by the
    /// caller's clock at admission.
    pub fn new(
        organization_id: impl Into<String>,
        agent_id: impl Into<String>,
        action_type: ActionType,
        description: impl Into<String>,
        risk: RiskAssessment,
        policy: QuorumConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            agent_id: agent_id.into(),
            action_type,
            action_data: serde_json::Value::Object(serde_json::Map::new()),
            description: description.into(),
            justification: None,
            amount: None,
            resource: None,
            status: RequestStatus::Pending,
            priority: RequestPriority::default(),
            risk,
            policy,
            auto_approval_attempted: false,
            created_at: now,
            updated_at: now,
            timeout_at: None,
            resolved_at: None,
            version: 1,
        }
    }

    pub fn with_action_data(mut self, data: serde_json::Value) -> Self {
        self.action_data = data;
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_priority(mut self, priority: RequestPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_at(mut self, timeout_at: DateTime<Utc>) -> Self {
        self.timeout_at = Some(timeout_at);
        self
    }

    /// Check if can transition to the given status.
    pub fn can_transition_to(&self, new_status: RequestStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Check if the request is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the request deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.timeout_at.is_some_and(|t| t <= now)
    }

    /// Validate admission input.
    pub fn validate(&self) -> Result<(), String> {
        if self.organization_id.trim().is_empty() {
            return Err("organization id cannot be empty".to_string());
        }
        if self.agent_id.trim().is_empty() {
            return Err("agent id cannot be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description cannot be empty".to_string());
        }
        if !self.risk.score.is_finite() {
            return Err("risk score must be a finite number".to_string());
        }
        if let Some(amount) = self.amount {
            if amount.is_sign_negative() {
                return Err("amount cannot be negative".to_string());
            }
        }
        Ok(())
    }
}
