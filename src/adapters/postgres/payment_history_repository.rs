//! PostgreSQL implementation of PaymentHistoryRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{parse_user_id, query_failed};
use crate::domain::foundation::{DomainError, IntentId, Timestamp};
use crate::domain::membership::{BillingReason, PaymentRecord};
use crate::ports::{PaymentHistoryRepository, SaveResult};

pub struct PostgresPaymentHistoryRepository {
    pool: PgPool,
}

impl PostgresPaymentHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    invoice_id: String,
    user_id: String,
    intent_id: Option<Uuid>,
    subscription_id: Option<String>,
    amount: i64,
    currency: String,
    billing_reason: String,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    paid_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            invoice_id: row.invoice_id,
            user_id: parse_user_id(row.user_id)?,
            intent_id: row.intent_id.map(IntentId::from_uuid),
            subscription_id: row.subscription_id,
            amount: row.amount,
            currency: row.currency,
            billing_reason: BillingReason::parse(&row.billing_reason),
            period_start: row.period_start.map(Timestamp::from_datetime),
            period_end: row.period_end.map(Timestamp::from_datetime),
            paid_at: Timestamp::from_datetime(row.paid_at),
        })
    }
}

#[async_trait]
impl PaymentHistoryRepository for PostgresPaymentHistoryRepository {
    async fn upsert(&self, record: &PaymentRecord) -> Result<SaveResult, DomainError> {
        // xmax is zero only on a freshly inserted tuple
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO payment_history (
                invoice_id, user_id, intent_id, subscription_id, amount, currency,
                billing_reason, period_start, period_end, paid_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (invoice_id) DO UPDATE SET
                intent_id = COALESCE(EXCLUDED.intent_id, payment_history.intent_id),
                subscription_id = EXCLUDED.subscription_id,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                billing_reason = EXCLUDED.billing_reason,
                period_start = EXCLUDED.period_start,
                period_end = EXCLUDED.period_end
            RETURNING (xmax = 0)
            "#,
        )
        .bind(&record.invoice_id)
        .bind(record.user_id.as_str())
        .bind(record.intent_id.map(|id| *id.as_uuid()))
        .bind(&record.subscription_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(record.billing_reason.as_str())
        .bind(record.period_start.map(|t| *t.as_datetime()))
        .bind(record.period_end.map(|t| *t.as_datetime()))
        .bind(record.paid_at.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed("upsert payment"))?;

        Ok(if inserted {
            SaveResult::Inserted
        } else {
            SaveResult::AlreadyExists
        })
    }

    async fn find_by_invoice_id(
        &self,
        invoice_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT invoice_id, user_id, intent_id, subscription_id, amount, currency,
                   billing_reason, period_start, period_end, paid_at
            FROM payment_history
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find payment"))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn exists_for_intent(&self, intent_id: &IntentId) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM payment_history WHERE intent_id = $1)")
            .bind(intent_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("check payment for intent"))
    }
}
