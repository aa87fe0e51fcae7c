use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::models::{
    ActionType, ApprovalDecision, DecisionKind, OversightRequest, RequestPriority, RequestStatus,
    RequiredReviewer, ReviewerRequirement, RiskAssessment, RiskLevel,
};
use crate::domain::ports::request_repository::{PendingFilters, RequestRepository};
use crate::infrastructure::database::utils::{
    parse_datetime, parse_datetime_opt, parse_decimal_opt,
};
use crate::infrastructure::database::DatabaseError;

/// SQLite implementation of [`RequestRepository`].
pub struct RequestRepositoryImpl {
    pool: SqlitePool,
}

impl RequestRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_request(row: &SqliteRow) -> Result<OversightRequest, DatabaseError> {
        let action_type_raw: String = row.get("action_type");
        let status_raw: String = row.get("status");
        let priority_raw: String = row.get("priority");
        let risk_level_raw: String = row.get("risk_level");

        Ok(OversightRequest {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            organization_id: row.get("organization_id"),
            agent_id: row.get("agent_id"),
            action_type: ActionType::from_str(&action_type_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown action type {action_type_raw:?}"))
            })?,
            action_data: serde_json::from_str(row.get::<String, _>("action_data").as_str())?,
            description: row.get("description"),
            justification: row.get("justification"),
            amount: parse_decimal_opt(row.get::<Option<String>, _>("amount").as_deref())?,
            resource: row.get("resource"),
            status: RequestStatus::from_str(&status_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown status {status_raw:?}"))
            })?,
            priority: RequestPriority::from_str(&priority_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown priority {priority_raw:?}"))
            })?,
            risk: RiskAssessment {
                score: row.get("risk_score"),
                level: RiskLevel::from_str(&risk_level_raw).ok_or_else(|| {
                    DatabaseError::ParseError(format!("unknown risk level {risk_level_raw:?}"))
                })?,
                factors: serde_json::from_str(row.get::<String, _>("risk_factors").as_str())?,
            },
            policy: serde_json::from_str(row.get::<String, _>("policy_snapshot").as_str())?,
            auto_approval_attempted: row.get::<i64, _>("auto_approval_attempted") != 0,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str())?,
            timeout_at: parse_datetime_opt(row.get::<Option<String>, _>("timeout_at").as_deref())?,
            resolved_at: parse_datetime_opt(
                row.get::<Option<String>, _>("resolved_at").as_deref(),
            )?,
            version: row.get::<i64, _>("version") as u32,
        })
    }

    fn row_to_decision(row: &SqliteRow) -> Result<ApprovalDecision, DatabaseError> {
        let decision_raw: String = row.get("decision");
        Ok(ApprovalDecision {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            request_id: Uuid::parse_str(row.get::<String, _>("request_id").as_str())?,
            reviewer_id: row.get("reviewer_id"),
            slot_id: row
                .get::<Option<String>, _>("slot_id")
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()?,
            decision: DecisionKind::from_str(&decision_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown decision {decision_raw:?}"))
            })?,
            weight: row.get::<i64, _>("weight") as u32,
            reason: row.get("reason"),
            decided_at: parse_datetime(row.get::<String, _>("decided_at").as_str())?,
        })
    }

    fn row_to_reviewer(row: &SqliteRow) -> Result<RequiredReviewer, DatabaseError> {
        let kind: String = row.get("requirement_kind");
        let value: String = row.get("requirement_value");
        Ok(RequiredReviewer {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            request_id: Uuid::parse_str(row.get::<String, _>("request_id").as_str())?,
            requirement: ReviewerRequirement::from_parts(&kind, &value).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown requirement kind {kind:?}"))
            })?,
            weight: row.get::<i64, _>("weight") as u32,
        })
    }
}

const OPEN_STATUSES: &str = "('pending', 'in_review', 'escalated')";

#[async_trait]
impl RequestRepository for RequestRepositoryImpl {
    async fn insert(
        &self,
        request: &OversightRequest,
        reviewers: &[RequiredReviewer],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO requests (
                id, organization_id, agent_id, action_type, action_data,
                description, justification, amount, resource, status, priority,
                risk_score, risk_level, risk_factors, policy_name, policy_snapshot,
                auto_approval_attempted, created_at, updated_at, timeout_at,
                resolved_at, version
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            ",
        )
        .bind(request.id.to_string())
        .bind(&request.organization_id)
        .bind(&request.agent_id)
        .bind(request.action_type.as_str())
        .bind(serde_json::to_string(&request.action_data)?)
        .bind(&request.description)
        .bind(&request.justification)
        .bind(request.amount.map(|a| a.to_string()))
        .bind(&request.resource)
        .bind(request.status.as_str())
        .bind(request.priority.as_str())
        .bind(request.risk.score)
        .bind(request.risk.level.as_str())
        .bind(serde_json::to_string(&request.risk.factors)?)
        .bind(&request.policy.name)
        .bind(serde_json::to_string(&request.policy)?)
        .bind(i64::from(request.auto_approval_attempted))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .bind(request.timeout_at.map(|t| t.to_rfc3339()))
        .bind(request.resolved_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(request.version))
        .execute(&mut *tx)
        .await?;

        for reviewer in reviewers {
            sqlx::query(
                r"
                INSERT INTO required_reviewers (id, request_id, requirement_kind, requirement_value, weight)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(reviewer.id.to_string())
            .bind(reviewer.request_id.to_string())
            .bind(reviewer.requirement.kind_str())
            .bind(reviewer.requirement.value())
            .bind(i64::from(reviewer.weight))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(request_id = %request.id, reviewers = reviewers.len(), "request persisted");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<OversightRequest>, DatabaseError> {
        let row = sqlx::query("SELECT * FROM requests WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_request).transpose()
    }

    async fn list_pending(
        &self,
        filters: PendingFilters,
    ) -> Result<Vec<OversightRequest>, DatabaseError> {
        // Empty-string binds disable a filter; negative LIMIT means no limit.
        let sql = format!(
            "SELECT * FROM requests
             WHERE status IN {OPEN_STATUSES}
               AND (?1 = '' OR organization_id = ?1)
               AND (?2 = '' OR agent_id = ?2)
               AND (?3 = '' OR status = ?3)
               AND (?4 = '' OR priority = ?4)
             ORDER BY created_at ASC
             LIMIT ?5"
        );

        let rows = sqlx::query(&sql)
            .bind(filters.organization_id.unwrap_or_default())
            .bind(filters.agent_id.unwrap_or_default())
            .bind(filters.status.map_or("", |s| s.as_str()))
            .bind(filters.priority.map_or("", |p| p.as_str()))
            .bind(filters.limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OversightRequest>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM requests
             WHERE status IN {OPEN_STATUSES}
               AND timeout_at IS NOT NULL AND timeout_at <= ?1
             ORDER BY timeout_at ASC"
        ))
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn list_open(&self) -> Result<Vec<OversightRequest>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT * FROM requests WHERE status IN {OPEN_STATUSES} ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_request).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_version: u32,
        new_status: RequestStatus,
        updated_at: DateTime<Utc>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r"
            UPDATE requests
            SET status = ?1, version = version + 1, updated_at = ?2, resolved_at = ?3
            WHERE id = ?4 AND version = ?5
            ",
        )
        .bind(new_status.as_str())
        .bind(updated_at.to_rfc3339())
        .bind(resolved_at.map(|t| t.to_rfc3339()))
        .bind(id.to_string())
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::OptimisticLockConflict {
                request_id: id,
                expected_version,
            });
        }
        Ok(())
    }

    async fn list_reviewers(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<RequiredReviewer>, DatabaseError> {
        let rows = sqlx::query("SELECT * FROM required_reviewers WHERE request_id = ?1")
            .bind(request_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_reviewer).collect()
    }

    async fn insert_decision(&self, decision: &ApprovalDecision) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r"
            INSERT INTO decisions (id, request_id, reviewer_id, slot_id, decision, weight, reason, decided_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(decision.id.to_string())
        .bind(decision.request_id.to_string())
        .bind(&decision.reviewer_id)
        .bind(decision.slot_id.map(|s| s.to_string()))
        .bind(decision.decision.as_str())
        .bind(i64::from(decision.weight))
        .bind(&decision.reason)
        .bind(decision.decided_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let unique = e
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if unique {
                    Err(DatabaseError::DuplicateDecision {
                        request_id: decision.request_id,
                        reviewer_id: decision.reviewer_id.clone(),
                    })
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn list_decisions(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<ApprovalDecision>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT * FROM decisions WHERE request_id = ?1 ORDER BY decided_at ASC, id ASC",
        )
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_decision).collect()
    }
}
