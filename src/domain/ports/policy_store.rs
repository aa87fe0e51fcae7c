use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::models::{ActionType, AutoApprovalRule, EscalationRule, QuorumConfig};
use crate::infrastructure::database::DatabaseError;

/// Read-mostly store of quorum policies, auto-approval rules, and
/// escalation rules. The engine reads it at admission and on monitor
/// ticks; writes come from operators (CLI `policy sync`).
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Resolve the single applicable quorum policy for a request shape,
    /// most specific match first. `Ok(None)` means no policy matches and
    /// admission must fail.
    async fn resolve_quorum(
        &self,
        organization_id: &str,
        action_type: ActionType,
        amount: Option<Decimal>,
    ) -> Result<Option<QuorumConfig>, DatabaseError>;

    /// Enabled auto-approval rules for an organization.
    async fn find_auto_approval(
        &self,
        organization_id: &str,
    ) -> Result<Vec<AutoApprovalRule>, DatabaseError>;

    /// Enabled escalation rules for an organization.
    async fn list_escalation_rules(
        &self,
        organization_id: &str,
    ) -> Result<Vec<EscalationRule>, DatabaseError>;

    /// Record that a rule fired for a request. Returns `false` when a
    /// firing was already recorded (the rule must not fire again).
    async fn record_firing(
        &self,
        rule_id: Uuid,
        request_id: Uuid,
        fired_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    /// Insert or replace a quorum policy by (organization, name).
    async fn upsert_quorum(&self, config: &QuorumConfig) -> Result<(), DatabaseError>;

    /// Insert an auto-approval rule.
    async fn insert_auto_approval(&self, rule: &AutoApprovalRule) -> Result<(), DatabaseError>;

    /// Insert or replace an escalation rule by (organization, name).
    async fn upsert_escalation_rule(&self, rule: &EscalationRule) -> Result<(), DatabaseError>;
}
