//! PostgreSQL implementation of GiftCardStore.
//!
//! A debit runs in one transaction: the card row is locked with
//! `SELECT ... FOR UPDATE`, the ledger is checked for the order reference,
//! and balance and ledger row are written together. Concurrent debits of one
//! card serialize on the row lock; the unique `(gift_card_id,
//! order_reference)` constraint backs up idempotency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{parse_column, parse_user_id, query_failed};
use crate::domain::foundation::{DomainError, ErrorCode, GiftCardId, Timestamp, UserId};
use crate::domain::membership::{
    DebitAmount, GiftCard, GiftCardCode, GiftCardDebit, GiftCardTransaction,
};
use crate::ports::GiftCardStore;

pub struct PostgresGiftCardStore {
    pool: PgPool,
}

impl PostgresGiftCardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GiftCardRow {
    id: Uuid,
    code: String,
    balance: i64,
    status: String,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<GiftCardRow> for GiftCard {
    type Error = DomainError;

    fn try_from(row: GiftCardRow) -> Result<Self, Self::Error> {
        Ok(GiftCard {
            id: GiftCardId::from_uuid(row.id),
            code: GiftCardCode::new(&row.code)
                .map_err(|e| DomainError::database(format!("Invalid gift card code: {}", e)))?,
            balance: row.balance,
            status: parse_column("status", &row.status)?,
            expires_at: row.expires_at.map(Timestamp::from_datetime),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    gift_card_id: Uuid,
    user_id: String,
    amount_used: i64,
    balance_after: i64,
    status_after: String,
    order_reference: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for GiftCardTransaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(GiftCardTransaction {
            gift_card_id: GiftCardId::from_uuid(row.gift_card_id),
            user_id: parse_user_id(row.user_id)?,
            amount_used: row.amount_used,
            balance_after: row.balance_after,
            status_after: parse_column("status_after", &row.status_after)?,
            order_reference: row.order_reference,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl GiftCardStore for PostgresGiftCardStore {
    async fn find_by_code(&self, code: &GiftCardCode) -> Result<Option<GiftCard>, DomainError> {
        let row: Option<GiftCardRow> = sqlx::query_as(
            "SELECT id, code, balance, status, expires_at FROM gift_cards WHERE code = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find gift card"))?;

        row.map(GiftCard::try_from).transpose()
    }

    async fn find_by_id(&self, id: &GiftCardId) -> Result<Option<GiftCard>, DomainError> {
        let row: Option<GiftCardRow> = sqlx::query_as(
            "SELECT id, code, balance, status, expires_at FROM gift_cards WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find gift card"))?;

        row.map(GiftCard::try_from).transpose()
    }

    async fn apply_debit(
        &self,
        id: &GiftCardId,
        user_id: &UserId,
        amount: DebitAmount,
        order_reference: &str,
    ) -> Result<GiftCardDebit, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(query_failed("begin gift card debit"))?;

        // 1. Lock the card
        let row: Option<GiftCardRow> = sqlx::query_as(
            r#"
            SELECT id, code, balance, status, expires_at
            FROM gift_cards
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed("lock gift card"))?;
        let mut card = match row {
            Some(row) => GiftCard::try_from(row)?,
            None => {
                return Err(DomainError::new(
                    ErrorCode::GiftCardNotFound,
                    "gift card not found",
                ))
            }
        };

        // 2. Replay a prior debit for the same order
        let prior: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT gift_card_id, user_id, amount_used, balance_after, status_after,
                   order_reference, created_at
            FROM gift_card_transactions
            WHERE gift_card_id = $1 AND order_reference = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(order_reference)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed("find gift card transaction"))?;
        if let Some(prior) = prior {
            tx.rollback()
                .await
                .map_err(query_failed("release gift card lock"))?;
            return Ok(GiftCardTransaction::try_from(prior)?.to_debit(true));
        }

        // 3. Debit and write both rows
        let now = Timestamp::now();
        let used = card.debit(amount, now).map_err(|e| {
            DomainError::new(ErrorCode::ValidationFailed, e.to_string())
                .with_detail("field", "gift_card")
        })?;

        sqlx::query("UPDATE gift_cards SET balance = $2, status = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(card.balance)
            .bind(card.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_failed("update gift card balance"))?;

        sqlx::query(
            r#"
            INSERT INTO gift_card_transactions (
                gift_card_id, user_id, amount_used, balance_after, status_after,
                order_reference, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_str())
        .bind(used)
        .bind(card.balance)
        .bind(card.status.as_str())
        .bind(order_reference)
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(query_failed("record gift card transaction"))?;

        tx.commit()
            .await
            .map_err(query_failed("commit gift card debit"))?;

        Ok(GiftCardDebit {
            gift_card_id: *id,
            amount_used: used,
            remaining_balance: card.balance,
            status: card.status,
            already_applied: false,
        })
    }

    async fn find_transaction(
        &self,
        id: &GiftCardId,
        order_reference: &str,
    ) -> Result<Option<GiftCardTransaction>, DomainError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT gift_card_id, user_id, amount_used, balance_after, status_after,
                   order_reference, created_at
            FROM gift_card_transactions
            WHERE gift_card_id = $1 AND order_reference = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(order_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find gift card transaction"))?;

        row.map(GiftCardTransaction::try_from).transpose()
    }
}
