//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use super::query_failed;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: String,
    event_type: String,
    processed_at: DateTime<Utc>,
    outcome: String,
    note: Option<String>,
    payload: Json<serde_json::Value>,
}

impl From<EventRow> for WebhookEventRecord {
    fn from(row: EventRow) -> Self {
        WebhookEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            processed_at: Timestamp::from_datetime(row.processed_at),
            outcome: WebhookOutcome::parse(&row.outcome),
            note: row.note,
            payload: row.payload.0,
        }
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<EventRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, processed_at, outcome, note, payload
            FROM processed_webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find webhook event"))?;

        Ok(row.map(WebhookEventRecord::from))
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (
                event_id, event_type, processed_at, outcome, note, payload
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.processed_at.as_datetime())
        .bind(record.outcome.as_str())
        .bind(&record.note)
        .bind(Json(&record.payload))
        .execute(&self.pool)
        .await
        .map_err(query_failed("record webhook event"))?;

        Ok(if result.rows_affected() == 0 {
            SaveResult::AlreadyExists
        } else {
            SaveResult::Inserted
        })
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_webhook_events WHERE processed_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(query_failed("prune webhook events"))?;

        Ok(result.rows_affected())
    }
}
