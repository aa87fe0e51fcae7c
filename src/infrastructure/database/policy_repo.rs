use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::{
    ActionType, AutoApprovalRule, EscalationRule, EscalationTarget, QuorumConfig,
};
use crate::domain::ports::policy_store::PolicyStore;
use crate::infrastructure::database::utils::parse_decimal_opt;
use crate::infrastructure::database::DatabaseError;

/// SQLite implementation of [`PolicyStore`].
pub struct PolicyStoreImpl {
    pool: SqlitePool,
}

impl PolicyStoreImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_quorum(row: &SqliteRow) -> Result<QuorumConfig, DatabaseError> {
        let action_type = row
            .get::<Option<String>, _>("action_type")
            .map(|s| {
                ActionType::from_str(&s).ok_or_else(|| {
                    DatabaseError::ParseError(format!("unknown action type {s:?}"))
                })
            })
            .transpose()?;
        Ok(QuorumConfig {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            required_approvals: row.get::<i64, _>("required_approvals") as u32,
            required_weight: row
                .get::<Option<i64>, _>("required_weight")
                .map(|w| w as u32),
            any_rejection_rejects: row.get::<i64, _>("any_rejection_rejects") != 0,
            require_unanimous: row.get::<i64, _>("require_unanimous") != 0,
            action_type,
            min_amount: parse_decimal_opt(row.get::<Option<String>, _>("min_amount").as_deref())?,
            approval_timeout_secs: row
                .get::<Option<i64>, _>("approval_timeout_secs")
                .map(|s| s as u64),
            track_in_review: row.get::<i64, _>("track_in_review") != 0,
        })
    }

    fn row_to_auto_approval(row: &SqliteRow) -> Result<AutoApprovalRule, DatabaseError> {
        let action_type_raw: String = row.get("action_type");
        Ok(AutoApprovalRule {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            organization_id: row.get("organization_id"),
            action_type: ActionType::from_str(&action_type_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown action type {action_type_raw:?}"))
            })?,
            max_amount: parse_decimal_opt(row.get::<Option<String>, _>("max_amount").as_deref())?,
            allowed_resources: serde_json::from_str(
                row.get::<String, _>("allowed_resources").as_str(),
            )?,
            enabled: row.get::<i64, _>("enabled") != 0,
        })
    }

    fn row_to_escalation(row: &SqliteRow) -> Result<EscalationRule, DatabaseError> {
        let target_kind: String = row.get("target_kind");
        let target_value: String = row.get("target_value");
        let action_type = row
            .get::<Option<String>, _>("action_type")
            .map(|s| {
                ActionType::from_str(&s).ok_or_else(|| {
                    DatabaseError::ParseError(format!("unknown action type {s:?}"))
                })
            })
            .transpose()?;
        Ok(EscalationRule {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            trigger_after_secs: row.get::<i64, _>("trigger_after_secs") as u64,
            target: EscalationTarget::from_parts(&target_kind, &target_value).ok_or_else(
                || DatabaseError::ParseError(format!("unknown target kind {target_kind:?}")),
            )?,
            channel: row.get("channel"),
            action_type,
            enabled: row.get::<i64, _>("enabled") != 0,
        })
    }
}

#[async_trait]
impl PolicyStore for PolicyStoreImpl {
    async fn resolve_quorum(
        &self,
        organization_id: &str,
        action_type: ActionType,
        amount: Option<Decimal>,
    ) -> Result<Option<QuorumConfig>, DatabaseError> {
        let rows =
            sqlx::query("SELECT * FROM quorum_configs WHERE organization_id = ?1 ORDER BY name")
                .bind(organization_id)
                .fetch_all(&self.pool)
                .await?;
        let candidates = rows
            .iter()
            .map(Self::row_to_quorum)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QuorumConfig::resolve(&candidates, action_type, amount))
    }

    async fn find_auto_approval(
        &self,
        organization_id: &str,
    ) -> Result<Vec<AutoApprovalRule>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT * FROM auto_approval_rules WHERE organization_id = ?1 AND enabled = 1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_auto_approval).collect()
    }

    async fn list_escalation_rules(
        &self,
        organization_id: &str,
    ) -> Result<Vec<EscalationRule>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT * FROM escalation_rules WHERE organization_id = ?1 AND enabled = 1",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_escalation).collect()
    }

    async fn record_firing(
        &self,
        rule_id: Uuid,
        request_id: Uuid,
        fired_at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO escalation_firings (rule_id, request_id, fired_at)
             VALUES (?1, ?2, ?3)",
        )
        .bind(rule_id.to_string())
        .bind(request_id.to_string())
        .bind(fired_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_quorum(&self, config: &QuorumConfig) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO quorum_configs (
                id, organization_id, name, required_approvals, required_weight,
                any_rejection_rejects, require_unanimous, action_type, min_amount,
                approval_timeout_secs, track_in_review
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(organization_id, name) DO UPDATE SET
                required_approvals = excluded.required_approvals,
                required_weight = excluded.required_weight,
                any_rejection_rejects = excluded.any_rejection_rejects,
                require_unanimous = excluded.require_unanimous,
                action_type = excluded.action_type,
                min_amount = excluded.min_amount,
                approval_timeout_secs = excluded.approval_timeout_secs,
                track_in_review = excluded.track_in_review
            ",
        )
        .bind(config.id.to_string())
        .bind(&config.organization_id)
        .bind(&config.name)
        .bind(i64::from(config.required_approvals))
        .bind(config.required_weight.map(i64::from))
        .bind(i64::from(config.any_rejection_rejects))
        .bind(i64::from(config.require_unanimous))
        .bind(config.action_type.map(|t| t.as_str()))
        .bind(config.min_amount.map(|a| a.to_string()))
        .bind(config.approval_timeout_secs.map(|s| s as i64))
        .bind(i64::from(config.track_in_review))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_auto_approval(&self, rule: &AutoApprovalRule) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO auto_approval_rules (id, organization_id, action_type, max_amount, allowed_resources, enabled)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(rule.id.to_string())
        .bind(&rule.organization_id)
        .bind(rule.action_type.as_str())
        .bind(rule.max_amount.map(|a| a.to_string()))
        .bind(serde_json::to_string(&rule.allowed_resources)?)
        .bind(i64::from(rule.enabled))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_escalation_rule(&self, rule: &EscalationRule) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO escalation_rules (
                id, organization_id, name, trigger_after_secs, target_kind,
                target_value, channel, action_type, enabled
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(organization_id, name) DO UPDATE SET
                trigger_after_secs = excluded.trigger_after_secs,
                target_kind = excluded.target_kind,
                target_value = excluded.target_value,
                channel = excluded.channel,
                action_type = excluded.action_type,
                enabled = excluded.enabled
            ",
        )
        .bind(rule.id.to_string())
        .bind(&rule.organization_id)
        .bind(&rule.name)
        .bind(rule.trigger_after_secs as i64)
        .bind(rule.target.kind_str())
        .bind(rule.target.value())
        .bind(&rule.channel)
        .bind(rule.action_type.map(|t| t.as_str()))
        .bind(i64::from(rule.enabled))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
