//! PostgreSQL implementation of IntentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{parse_column, parse_user_id, query_failed};
use crate::domain::foundation::{DomainError, ErrorCode, GiftCardId, IntentId, Timestamp, UserId};
use crate::domain::membership::{IntentStatus, MembershipIntent};
use crate::ports::IntentRepository;

const INTENT_COLUMNS: &str = r#"
    id, user_id, membership_type, billing_cycle, original_amount, coupon_code,
    coupon_discount, gift_card_id, gift_card_applied_amount, final_amount, status,
    checkout_session_id, initiated_at, verified_at, activated_at
"#;

pub struct PostgresIntentRepository {
    pool: PgPool,
}

impl PostgresIntentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IntentRow {
    id: Uuid,
    user_id: String,
    membership_type: String,
    billing_cycle: String,
    original_amount: i64,
    coupon_code: Option<String>,
    coupon_discount: i64,
    gift_card_id: Option<Uuid>,
    gift_card_applied_amount: i64,
    final_amount: i64,
    status: String,
    checkout_session_id: Option<String>,
    initiated_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    activated_at: Option<DateTime<Utc>>,
}

impl TryFrom<IntentRow> for MembershipIntent {
    type Error = DomainError;

    fn try_from(row: IntentRow) -> Result<Self, Self::Error> {
        Ok(MembershipIntent {
            id: IntentId::from_uuid(row.id),
            user_id: parse_user_id(row.user_id)?,
            membership_type: parse_column("membership_type", &row.membership_type)?,
            billing_cycle: parse_column("billing_cycle", &row.billing_cycle)?,
            original_amount: row.original_amount,
            coupon_code: row.coupon_code,
            coupon_discount: row.coupon_discount,
            gift_card_id: row.gift_card_id.map(GiftCardId::from_uuid),
            gift_card_applied_amount: row.gift_card_applied_amount,
            final_amount: row.final_amount,
            status: parse_column("status", &row.status)?,
            checkout_session_id: row.checkout_session_id,
            initiated_at: Timestamp::from_datetime(row.initiated_at),
            verified_at: row.verified_at.map(Timestamp::from_datetime),
            activated_at: row.activated_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl IntentRepository for PostgresIntentRepository {
    async fn replace_initiated(&self, intent: &MembershipIntent) -> Result<u64, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("begin intent replace"))?;

        // 1. Serialize draft replacement per user
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(intent.user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("lock user intents"))?;

        // 2. Supersede the live draft
        let superseded = sqlx::query(
            r#"
            UPDATE membership_intents SET status = $2
            WHERE user_id = $1 AND status = $3
            "#,
        )
        .bind(intent.user_id.as_str())
        .bind(IntentStatus::Cancelled.as_str())
        .bind(IntentStatus::Initiated.as_str())
        .execute(&mut *tx)
        .await
        .map_err(query_failed("supersede intents"))?
        .rows_affected();

        // 3. Insert the new one
        sqlx::query(
            r#"
            INSERT INTO membership_intents (
                id, user_id, membership_type, billing_cycle, original_amount, coupon_code,
                coupon_discount, gift_card_id, gift_card_applied_amount, final_amount, status,
                checkout_session_id, initiated_at, verified_at, activated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(intent.id.as_uuid())
        .bind(intent.user_id.as_str())
        .bind(intent.membership_type.as_str())
        .bind(intent.billing_cycle.as_str())
        .bind(intent.original_amount)
        .bind(&intent.coupon_code)
        .bind(intent.coupon_discount)
        .bind(intent.gift_card_id.map(|id| *id.as_uuid()))
        .bind(intent.gift_card_applied_amount)
        .bind(intent.final_amount)
        .bind(intent.status.as_str())
        .bind(&intent.checkout_session_id)
        .bind(intent.initiated_at.as_datetime())
        .bind(intent.verified_at.map(|t| *t.as_datetime()))
        .bind(intent.activated_at.map(|t| *t.as_datetime()))
        .execute(&mut *tx)
        .await
        .map_err(query_failed("save intent"))?;

        tx.commit()
            .await
            .map_err(query_failed("commit intent replace"))?;

        Ok(superseded)
    }

    async fn find_by_id(&self, id: &IntentId) -> Result<Option<MembershipIntent>, DomainError> {
        let row: Option<IntentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM membership_intents WHERE id = $1",
            INTENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find intent"))?;

        row.map(MembershipIntent::try_from).transpose()
    }

    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
        statuses: &[IntentStatus],
    ) -> Result<Option<MembershipIntent>, DomainError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let row: Option<IntentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM membership_intents
            WHERE user_id = $1 AND status = ANY($2)
            ORDER BY initiated_at DESC
            LIMIT 1
            "#,
            INTENT_COLUMNS
        ))
        .bind(user_id.as_str())
        .bind(&statuses)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find latest intent"))?;

        row.map(MembershipIntent::try_from).transpose()
    }

    async fn set_checkout_session(
        &self,
        id: &IntentId,
        checkout_session_id: &str,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE membership_intents SET checkout_session_id = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(checkout_session_id)
        .execute(&self.pool)
        .await
        .map_err(query_failed("set checkout session"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::IntentNotFound, "intent not found"));
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: &IntentId,
        from: IntentStatus,
        to: IntentStatus,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        // The WHERE on status makes this a compare-and-set
        let result = sqlx::query(
            r#"
            UPDATE membership_intents SET
                status = $3,
                verified_at = CASE WHEN $3 = 'paid_pending_verification' THEN $4 ELSE verified_at END,
                activated_at = CASE WHEN $3 = 'active' THEN $4 ELSE activated_at END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(query_failed("transition intent"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_initiated_before(
        &self,
        status: IntentStatus,
        cutoff: Timestamp,
    ) -> Result<Vec<MembershipIntent>, DomainError> {
        let rows: Vec<IntentRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM membership_intents
            WHERE status = $1 AND initiated_at < $2
            ORDER BY initiated_at ASC
            "#,
            INTENT_COLUMNS
        ))
        .bind(status.as_str())
        .bind(cutoff.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("find stale intents"))?;

        rows.into_iter().map(MembershipIntent::try_from).collect()
    }
}
