//! PreviewDiscountHandler - prices a purchase without moving any money.

use std::sync::Arc;

use crate::domain::membership::{CouponKind, MembershipError};

use super::DiscountLedger;

#[derive(Debug, Clone)]
pub struct PreviewDiscountQuery {
    pub amount: i64,
    pub coupon_code: Option<String>,
    pub gift_card_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountPreview {
    pub original_amount: i64,
    /// Normalized code of the coupon that applied, if any.
    pub coupon_code: Option<String>,
    pub coupon_kind: Option<CouponKind>,
    pub coupon_discount: i64,
    pub gift_card_applied: i64,
    /// Balance left on the card after this purchase would be paid.
    pub gift_card_remaining: Option<i64>,
    pub final_amount: i64,
}

pub struct PreviewDiscountHandler {
    ledger: Arc<DiscountLedger>,
}

impl PreviewDiscountHandler {
    pub fn new(ledger: Arc<DiscountLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, query: PreviewDiscountQuery) -> Result<DiscountPreview, MembershipError> {
        let quote = self
            .ledger
            .quote(
                query.amount,
                non_blank(query.coupon_code.as_deref()),
                non_blank(query.gift_card_code.as_deref()),
            )
            .await?;

        let breakdown = quote.breakdown;
        Ok(DiscountPreview {
            original_amount: breakdown.original_amount,
            coupon_code: quote.coupon.code().map(str::to_string),
            coupon_kind: quote.coupon.kind(),
            coupon_discount: breakdown.coupon_discount,
            gift_card_applied: breakdown.gift_card_applied,
            gift_card_remaining: quote
                .gift_card
                .map(|g| g.available_balance - breakdown.gift_card_applied),
            final_amount: breakdown.final_amount,
        })
    }
}

fn non_blank(code: Option<&str>) -> Option<&str> {
    code.filter(|c| !c.trim().is_empty())
}
