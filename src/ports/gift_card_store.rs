//! GiftCardStore port - gift card balances and the debit ledger.
//!
//! `apply_debit` is atomic per card and idempotent on
//! `(gift_card_id, order_reference)`: a repeated call returns the first
//! result (amount, balance and status as they were right after that debit)
//! with `already_applied = true` and does not move the balance.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, GiftCardId, UserId};
use crate::domain::membership::{
    DebitAmount, GiftCard, GiftCardCode, GiftCardDebit, GiftCardTransaction,
};

#[async_trait]
pub trait GiftCardStore: Send + Sync {
    async fn find_by_code(&self, code: &GiftCardCode) -> Result<Option<GiftCard>, DomainError>;

    async fn find_by_id(&self, id: &GiftCardId) -> Result<Option<GiftCard>, DomainError>;

    /// Debits the card under its lock.
    ///
    /// Refusals (expired, used or disabled card, or a balance short of a
    /// `DebitAmount::Exactly`) come back as `ErrorCode::ValidationFailed`
    /// and write nothing.
    async fn apply_debit(
        &self,
        id: &GiftCardId,
        user_id: &UserId,
        amount: DebitAmount,
        order_reference: &str,
    ) -> Result<GiftCardDebit, DomainError>;

    async fn find_transaction(
        &self,
        id: &GiftCardId,
        order_reference: &str,
    ) -> Result<Option<GiftCardTransaction>, DomainError>;
}
