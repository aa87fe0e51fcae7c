//! Quorum policies and auto-approval rules.
//!
//! A request binds exactly one [`QuorumConfig`] at admission time. The
//! resolved config is captured on the request (by name) and later policy
//! edits never affect in-flight requests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::{ActionType, RiskAssessment};

/// Named approval policy for one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuorumConfig {
    pub id: Uuid,
    pub organization_id: String,
    pub name: String,
    /// Approvals needed when no weight threshold is configured.
    pub required_approvals: u32,
    /// Weight threshold; when set, takes precedence over the plain count.
    pub required_weight: Option<u32>,
    /// A single rejection resolves the request as rejected. This is the
    /// default mode; count/weight quorums that tolerate minority rejections
    /// must opt out explicitly.
    pub any_rejection_rejects: bool,
    /// Every required reviewer slot must decide, and all must approve.
    pub require_unanimous: bool,
    /// When set, the policy only applies to this action type.
    pub action_type: Option<ActionType>,
    /// When set, the policy only applies at or above this amount.
    pub min_amount: Option<Decimal>,
    /// Time allowed for a verdict; absent means the request never expires.
    pub approval_timeout_secs: Option<u64>,
    /// Whether the first recorded decision moves pending → in_review.
    pub track_in_review: bool,
}

impl QuorumConfig {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            name: name.into(),
            required_approvals: 1,
            required_weight: None,
            any_rejection_rejects: true,
            require_unanimous: false,
            action_type: None,
            min_amount: None,
            approval_timeout_secs: None,
            track_in_review: false,
        }
    }

    pub fn with_required_approvals(mut self, count: u32) -> Self {
        self.required_approvals = count.max(1);
        self
    }

    pub fn with_required_weight(mut self, weight: u32) -> Self {
        self.required_weight = Some(weight.max(1));
        self
    }

    pub fn with_any_rejection_rejects(mut self, flag: bool) -> Self {
        self.any_rejection_rejects = flag;
        self
    }

    pub fn with_unanimity(mut self) -> Self {
        self.require_unanimous = true;
        self
    }

    pub fn with_action_type(mut self, action_type: ActionType) -> Self {
        self.action_type = Some(action_type);
        self
    }

    pub fn with_min_amount(mut self, amount: Decimal) -> Self {
        self.min_amount = Some(amount);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.approval_timeout_secs = Some(secs);
        self
    }

    pub fn with_track_in_review(mut self, flag: bool) -> Self {
        self.track_in_review = flag;
        self
    }

    /// Whether this policy applies to a request shape at all.
    pub fn applies_to(&self, action_type: ActionType, amount: Option<Decimal>) -> bool {
        if let Some(bound) = self.action_type {
            if bound != action_type {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            match amount {
                Some(a) if a >= min => {}
                _ => return false,
            }
        }
        true
    }

    /// Specificity rank for resolution: action-type + amount-tier beats
    /// action-type alone beats the organization default.
    fn specificity(&self) -> u8 {
        match (self.action_type.is_some(), self.min_amount.is_some()) {
            (true, true) => 3,
            (true, false) => 2,
            (false, true) => 1,
            (false, false) => 0,
        }
    }

    /// Pick the most specific applicable policy from `candidates`.
    /// Among equally specific amount-tiered matches, the highest qualifying
    /// tier wins. Returns `None` when nothing applies.
    pub fn resolve(
        candidates: &[QuorumConfig],
        action_type: ActionType,
        amount: Option<Decimal>,
    ) -> Option<QuorumConfig> {
        candidates
            .iter()
            .filter(|c| c.applies_to(action_type, amount))
            .max_by(|a, b| {
                a.specificity()
                    .cmp(&b.specificity())
                    .then_with(|| a.min_amount.cmp(&b.min_amount))
            })
            .cloned()
    }
}

/// Bypass rule: low-risk, low-value actions resolve as approved without
/// human latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoApprovalRule {
    pub id: Uuid,
    pub organization_id: String,
    pub action_type: ActionType,
    /// Amount ceiling. A rule with a ceiling never matches a request that
    /// declares no amount.
    pub max_amount: Option<Decimal>,
    /// Allowed symbols/resources; empty means any.
    pub allowed_resources: Vec<String>,
    pub enabled: bool,
}

impl AutoApprovalRule {
    pub fn new(organization_id: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: organization_id.into(),
            action_type,
            max_amount: None,
            allowed_resources: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_max_amount(mut self, amount: Decimal) -> Self {
        self.max_amount = Some(amount);
        self
    }

    pub fn with_allowed_resource(mut self, resource: impl Into<String>) -> Self {
        self.allowed_resources.push(resource.into());
        self
    }

    /// Whether the rule clears this request for auto-approval.
    pub fn matches(
        &self,
        action_type: ActionType,
        amount: Option<Decimal>,
        resource: Option<&str>,
        risk: &RiskAssessment,
    ) -> bool {
        if !self.enabled || self.action_type != action_type {
            return false;
        }
        if risk.level.is_elevated() {
            return false;
        }
        if let Some(ceiling) = self.max_amount {
            match amount {
                Some(a) if a <= ceiling => {}
                _ => return false,
            }
        }
        if !self.allowed_resources.is_empty() {
            match resource {
                Some(r) if self.allowed_resources.iter().any(|allowed| allowed == r) => {}
                _ => return false,
            }
        }
        true
    }
}
