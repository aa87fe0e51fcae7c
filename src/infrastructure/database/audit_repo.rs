use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::{Actor, ActorKind, RequestStatus, StateTransition};
use crate::domain::ports::audit_log::AuditLog;
use crate::infrastructure::database::utils::parse_datetime;
use crate::infrastructure::database::DatabaseError;

/// SQLite implementation of [`AuditLog`].
///
/// The `state_transitions` table is append-only; this type issues INSERT
/// and SELECT statements only.
pub struct AuditLogImpl {
    pool: SqlitePool,
}

impl AuditLogImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_transition(row: &SqliteRow) -> Result<StateTransition, DatabaseError> {
        let from_status = row
            .get::<Option<String>, _>("from_status")
            .map(|s| {
                RequestStatus::from_str(&s).ok_or_else(|| {
                    DatabaseError::ParseError(format!("unknown status {s:?}"))
                })
            })
            .transpose()?;
        let to_status_raw: String = row.get("to_status");
        let actor_kind_raw: String = row.get("actor_kind");
        Ok(StateTransition {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            request_id: Uuid::parse_str(row.get::<String, _>("request_id").as_str())?,
            from_status,
            to_status: RequestStatus::from_str(&to_status_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown status {to_status_raw:?}"))
            })?,
            actor: Actor {
                kind: ActorKind::from_str(&actor_kind_raw).ok_or_else(|| {
                    DatabaseError::ParseError(format!("unknown actor kind {actor_kind_raw:?}"))
                })?,
                id: row.get("actor_id"),
            },
            reason: row.get("reason"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
        })
    }
}

#[async_trait]
impl AuditLog for AuditLogImpl {
    async fn append(&self, transition: &StateTransition) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO state_transitions (id, request_id, from_status, to_status, actor_kind, actor_id, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(transition.id.to_string())
        .bind(transition.request_id.to_string())
        .bind(transition.from_status.map(|s| s.as_str()))
        .bind(transition.to_status.as_str())
        .bind(transition.actor.kind.as_str())
        .bind(&transition.actor.id)
        .bind(&transition.reason)
        .bind(transition.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn history(&self, request_id: Uuid) -> Result<Vec<StateTransition>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT * FROM state_transitions WHERE request_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_transition).collect()
    }
}
