//! DiscountLedger - coupon and gift card resolution plus idempotent debits.
//!
//! Resolution never mutates balances, so a price can be previewed or put on
//! an intent before any money moves. Debits happen only through
//! [`DiscountLedger::apply_gift_card`].

use std::sync::Arc;

use crate::domain::foundation::{GiftCardId, Timestamp, UserId};
use crate::domain::membership::{
    validate_amount, Coupon, CouponResolution, DebitAmount, DiscountBreakdown, GiftCard,
    GiftCardCode, GiftCardDebit, MembershipError,
};
use crate::ports::{CouponStore, GiftCardStore};

/// A gift card that can currently pay for something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGiftCard {
    pub id: GiftCardId,
    pub available_balance: i64,
}

/// Coupon and gift card resolved against one amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountQuote {
    pub coupon: CouponResolution,
    pub gift_card: Option<ResolvedGiftCard>,
    pub breakdown: DiscountBreakdown,
}

pub struct DiscountLedger {
    coupons: Arc<dyn CouponStore>,
    gift_cards: Arc<dyn GiftCardStore>,
}

impl DiscountLedger {
    pub fn new(coupons: Arc<dyn CouponStore>, gift_cards: Arc<dyn GiftCardStore>) -> Self {
        Self {
            coupons,
            gift_cards,
        }
    }

    /// Looks up a coupon case-insensitively. Unknown or inactive codes
    /// resolve to [`CouponResolution::NotFound`] with zero discount.
    pub async fn resolve_coupon(
        &self,
        code: &str,
        amount: i64,
    ) -> Result<CouponResolution, MembershipError> {
        let code = Coupon::normalize_code(code);
        if code.is_empty() {
            return Ok(CouponResolution::NotFound);
        }
        let coupon = self.coupons.find_by_code(&code).await?;
        let resolution = CouponResolution::from_lookup(coupon, amount);
        if !resolution.is_found() {
            tracing::debug!(coupon_code = %code, "Coupon not found or inactive");
        }
        Ok(resolution)
    }

    /// Finds a redeemable gift card. Absent, exhausted, expired or
    /// non-active cards resolve to `None`.
    pub async fn resolve_gift_card(
        &self,
        code: &str,
    ) -> Result<Option<ResolvedGiftCard>, MembershipError> {
        let Ok(code) = GiftCardCode::new(code) else {
            return Ok(None);
        };
        let card = self.gift_cards.find_by_code(&code).await?;
        Ok(card
            .filter(|c| c.is_redeemable(Timestamp::now()))
            .map(|c| ResolvedGiftCard {
                id: c.id,
                available_balance: c.balance,
            }))
    }

    /// Looks up a card regardless of whether it can still pay.
    pub async fn find_gift_card(&self, code: &GiftCardCode) -> Result<Option<GiftCard>, MembershipError> {
        Ok(self.gift_cards.find_by_code(code).await?)
    }

    /// Debits a gift card, idempotent on `order_reference`.
    pub async fn apply_gift_card(
        &self,
        gift_card_id: &GiftCardId,
        user_id: &UserId,
        amount: DebitAmount,
        order_reference: &str,
    ) -> Result<GiftCardDebit, MembershipError> {
        let debit = self
            .gift_cards
            .apply_debit(gift_card_id, user_id, amount, order_reference)
            .await?;
        tracing::info!(
            gift_card_id = %gift_card_id,
            order_reference = %order_reference,
            amount_used = debit.amount_used,
            remaining_balance = debit.remaining_balance,
            already_applied = debit.already_applied,
            "Gift card debited"
        );
        Ok(debit)
    }

    /// True if `order_reference` has already debited the card.
    pub async fn has_debit(
        &self,
        gift_card_id: &GiftCardId,
        order_reference: &str,
    ) -> Result<bool, MembershipError> {
        Ok(self
            .gift_cards
            .find_transaction(gift_card_id, order_reference)
            .await?
            .is_some())
    }

    /// Resolves both discount sources against `amount`: coupon first on
    /// the original amount, then gift card on the remainder.
    pub async fn quote(
        &self,
        amount: i64,
        coupon_code: Option<&str>,
        gift_card_code: Option<&str>,
    ) -> Result<DiscountQuote, MembershipError> {
        validate_amount(amount)?;

        let coupon = match coupon_code {
            Some(code) => self.resolve_coupon(code, amount).await?,
            None => CouponResolution::NotFound,
        };
        let gift_card = match gift_card_code {
            Some(code) => self.resolve_gift_card(code).await?,
            None => None,
        };
        let breakdown = DiscountBreakdown::compute(
            amount,
            coupon.discount(),
            gift_card.map(|g| g.available_balance),
        )?;

        Ok(DiscountQuote {
            coupon,
            gift_card,
            breakdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryCouponStore, InMemoryGiftCardStore};
    use crate::domain::membership::{CouponKind, GiftCardStatus};

    async fn ledger() -> (DiscountLedger, Arc<InMemoryGiftCardStore>) {
        let coupons = Arc::new(InMemoryCouponStore::new());
        coupons
            .put(Coupon {
                code: "save20".into(),
                kind: CouponKind::Percentage { basis_points: 2000 },
                active: true,
            })
            .await;
        coupons
            .put(Coupon {
                code: "OLD".into(),
                kind: CouponKind::FixedAmount { amount: 500 },
                active: false,
            })
            .await;

        let gift_cards = Arc::new(InMemoryGiftCardStore::new());
        gift_cards.put(card("GIFT-50", 5000, GiftCardStatus::Active)).await;
        gift_cards.put(card("EMPTY", 0, GiftCardStatus::Used)).await;
        gift_cards.put(card("OFF", 900, GiftCardStatus::Disabled)).await;

        (DiscountLedger::new(coupons, gift_cards.clone()), gift_cards)
    }

    fn card(code: &str, balance: i64, status: GiftCardStatus) -> GiftCard {
        GiftCard {
            id: GiftCardId::new(),
            code: GiftCardCode::new(code).unwrap(),
            balance,
            status,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn quote_applies_coupon_then_gift_card() {
        let (ledger, _) = ledger().await;
        let quote = ledger
            .quote(15000, Some("Save20"), Some("gift-50"))
            .await
            .unwrap();

        assert_eq!(quote.coupon.discount(), 3000);
        assert_eq!(quote.breakdown.gift_card_applied, 5000);
        assert_eq!(quote.breakdown.final_amount, 7000);
    }

    #[tokio::test]
    async fn unknown_and_inactive_coupons_give_no_discount() {
        let (ledger, _) = ledger().await;
        assert!(!ledger.resolve_coupon("NOPE", 1000).await.unwrap().is_found());
        assert!(!ledger.resolve_coupon("old", 1000).await.unwrap().is_found());
        assert!(!ledger.resolve_coupon("   ", 1000).await.unwrap().is_found());
    }

    #[tokio::test]
    async fn exhausted_or_disabled_gift_cards_resolve_to_none() {
        let (ledger, _) = ledger().await;
        assert!(ledger.resolve_gift_card("EMPTY").await.unwrap().is_none());
        assert!(ledger.resolve_gift_card("OFF").await.unwrap().is_none());
        assert!(ledger.resolve_gift_card("missing").await.unwrap().is_none());
        assert!(ledger.resolve_gift_card("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolving_does_not_debit() {
        let (ledger, store) = ledger().await;
        ledger.quote(15000, None, Some("GIFT-50")).await.unwrap();
        let resolved = ledger.resolve_gift_card("GIFT-50").await.unwrap().unwrap();
        assert_eq!(resolved.available_balance, 5000);
        assert!(store.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn repeated_debit_with_same_reference_moves_balance_once() {
        let (ledger, store) = ledger().await;
        let card = ledger.resolve_gift_card("GIFT-50").await.unwrap().unwrap();
        let user = UserId::new("u1").unwrap();

        let first = ledger
            .apply_gift_card(&card.id, &user, DebitAmount::UpTo(2000), "order-1")
            .await
            .unwrap();
        let second = ledger
            .apply_gift_card(&card.id, &user, DebitAmount::UpTo(2000), "order-1")
            .await
            .unwrap();

        assert_eq!(first.remaining_balance, 3000);
        assert_eq!(second.remaining_balance, 3000);
        assert!(second.already_applied);
        assert_eq!(store.transactions().await.len(), 1);
        assert!(ledger.has_debit(&card.id, "order-1").await.unwrap());
    }

    #[tokio::test]
    async fn quote_rejects_out_of_range_amounts() {
        let (ledger, _) = ledger().await;
        assert!(matches!(
            ledger.quote(0, None, None).await,
            Err(MembershipError::Validation { .. })
        ));
    }
}
