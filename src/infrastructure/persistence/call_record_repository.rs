//! PostgreSQL implementation of the call record repository

use crate::domain::call::record::CallRecord;
use crate::domain::call::repository::CallRecordRepository;
use crate::domain::call::status::CallStatus;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AgentId, CallId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(FromRow)]
struct CallRecordRow {
    id: Uuid,
    agent_id: Uuid,
    plivo_call_id: Option<String>,
    from_number: String,
    to_number: String,
    call_status: String,
    duration_seconds: Option<i64>,
    transcript: Option<String>,
    call_metadata: String,
    error_message: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<CallRecordRow> for CallRecord {
    fn from(r: CallRecordRow) -> Self {
        CallRecord {
            id: CallId::from_uuid(r.id),
            agent_id: AgentId::from_uuid(r.agent_id),
            plivo_call_id: r.plivo_call_id,
            from_number: r.from_number,
            to_number: r.to_number,
            call_status: r.call_status.parse().unwrap_or(CallStatus::Failed),
            duration_seconds: r.duration_seconds,
            transcript: r.transcript,
            call_metadata: serde_json::from_str(&r.call_metadata).unwrap_or_default(),
            error_message: r.error_message,
            started_at: r.started_at,
            ended_at: r.ended_at,
            created_at: r.created_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, agent_id, plivo_call_id, from_number, to_number,
           call_status, duration_seconds, transcript, call_metadata,
           error_message, started_at, ended_at, created_at
    FROM call_records
"#;

pub struct PgCallRecordRepository {
    pool: PgPool,
}

impl PgCallRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallRecordRepository for PgCallRecordRepository {
    async fn find_by_id(&self, id: CallId) -> Result<Option<CallRecord>> {
        debug!("Getting call record by id: {}", id);

        let row = sqlx::query_as::<_, CallRecordRow>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get call record: {}", e);
                DomainError::Internal(format!("Database error: {}", e))
            })?;

        Ok(row.map(CallRecord::from))
    }

    async fn save(&self, record: &CallRecord) -> Result<()> {
        debug!("Saving call record: {}", record.id);

        let metadata = serde_json::to_string(&record.call_metadata)
            .map_err(|e| DomainError::Internal(format!("Metadata serialization: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO call_records (
                id, agent_id, plivo_call_id, from_number, to_number,
                call_status, duration_seconds, transcript, call_metadata,
                error_message, started_at, ended_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                plivo_call_id = EXCLUDED.plivo_call_id,
                call_status = EXCLUDED.call_status,
                duration_seconds = EXCLUDED.duration_seconds,
                transcript = EXCLUDED.transcript,
                call_metadata = EXCLUDED.call_metadata,
                error_message = EXCLUDED.error_message,
                ended_at = EXCLUDED.ended_at
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.agent_id.as_uuid())
        .bind(&record.plivo_call_id)
        .bind(&record.from_number)
        .bind(&record.to_number)
        .bind(record.call_status.as_str())
        .bind(record.duration_seconds)
        .bind(&record.transcript)
        .bind(metadata)
        .bind(&record.error_message)
        .bind(record.started_at)
        .bind(record.ended_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to save call record: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<CallRecord>> {
        let rows = sqlx::query_as::<_, CallRecordRow>(&format!(
            "{} ORDER BY created_at DESC LIMIT $1",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list call records: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        Ok(rows.into_iter().map(CallRecord::from).collect())
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<CallRecord>> {
        let rows = sqlx::query_as::<_, CallRecordRow>(&format!(
            "{} WHERE call_status NOT IN ('completed', 'failed') AND created_at < $1",
            SELECT_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to find stale call records: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        Ok(rows.into_iter().map(CallRecord::from).collect())
    }
}
