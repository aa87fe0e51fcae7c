use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::models::{DeliveryStatus, NotificationEventKind, NotificationRecord};
use crate::domain::ports::notifier::NotificationHistory;
use crate::infrastructure::database::utils::parse_datetime;
use crate::infrastructure::database::DatabaseError;

/// SQLite implementation of [`NotificationHistory`].
pub struct NotificationHistoryImpl {
    pool: SqlitePool,
}

impl NotificationHistoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &SqliteRow) -> Result<NotificationRecord, DatabaseError> {
        let event_kind_raw: String = row.get("event_kind");
        let status_raw: String = row.get("status");
        let status = match status_raw.as_str() {
            "delivered" => DeliveryStatus::Delivered,
            "failed" => DeliveryStatus::Failed,
            "duplicate" => DeliveryStatus::Duplicate,
            other => {
                return Err(DatabaseError::ParseError(format!(
                    "unknown delivery status {other:?}"
                )))
            }
        };
        Ok(NotificationRecord {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            request_id: Uuid::parse_str(row.get::<String, _>("request_id").as_str())?,
            channel: row.get("channel"),
            event_kind: NotificationEventKind::from_str(&event_kind_raw).ok_or_else(|| {
                DatabaseError::ParseError(format!("unknown event kind {event_kind_raw:?}"))
            })?,
            recipients: serde_json::from_str(row.get::<String, _>("recipients").as_str())?,
            idempotency_key: row.get("idempotency_key"),
            status,
            error: row.get("error"),
            attempts: row.get::<i64, _>("attempts") as u32,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
        })
    }
}

#[async_trait]
impl NotificationHistory for NotificationHistoryImpl {
    async fn find_by_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<NotificationRecord>, DatabaseError> {
        let row = sqlx::query("SELECT * FROM notification_log WHERE idempotency_key = ?1")
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn record(&self, record: &NotificationRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r"
            INSERT INTO notification_log (
                id, request_id, channel, event_kind, recipients,
                idempotency_key, status, error, attempts, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(idempotency_key) DO UPDATE SET
                status = excluded.status,
                error = excluded.error,
                attempts = excluded.attempts
            ",
        )
        .bind(record.id.to_string())
        .bind(record.request_id.to_string())
        .bind(&record.channel)
        .bind(record.event_kind.as_str())
        .bind(serde_json::to_string(&record.recipients)?)
        .bind(&record.idempotency_key)
        .bind(record.status.as_str())
        .bind(&record.error)
        .bind(i64::from(record.attempts))
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT * FROM notification_log WHERE request_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(request_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_record).collect()
    }
}
