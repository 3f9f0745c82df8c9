//! Discount arithmetic for coupons and gift cards.
//!
//! All amounts are integer minor currency units. Discounts compose in a
//! fixed order: the coupon applies to the original amount, then the gift
//! card applies to whatever the coupon left. Reversing the order changes
//! how much gift card balance is consumed, so the order is part of the
//! pricing contract.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// Largest purchase amount accepted, in minor units.
pub const MAX_AMOUNT: i64 = 100_000_000;

/// Basis points in 100%.
const FULL_BASIS_POINTS: i64 = 10_000;

/// How a coupon reduces the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouponKind {
    /// Percentage off, in basis points (2000 = 20%).
    Percentage { basis_points: u32 },
    /// Fixed amount off, in minor units.
    FixedAmount { amount: i64 },
}

impl CouponKind {
    /// Discount this coupon grants against `amount`, never more than `amount`.
    ///
    /// Percentages round half up to the nearest minor unit.
    pub fn discount_for(&self, amount: i64) -> i64 {
        if amount <= 0 {
            return 0;
        }
        let raw = match *self {
            CouponKind::Percentage { basis_points } => {
                let bp = i128::from(basis_points.min(FULL_BASIS_POINTS as u32));
                let scaled = (i128::from(amount) * bp + i128::from(FULL_BASIS_POINTS / 2))
                    / i128::from(FULL_BASIS_POINTS);
                i64::try_from(scaled).unwrap_or(amount)
            }
            CouponKind::FixedAmount { amount: off } => off.max(0),
        };
        raw.min(amount)
    }

    /// Short label used in API responses.
    pub fn label(&self) -> &'static str {
        match self {
            CouponKind::Percentage { .. } => "percentage",
            CouponKind::FixedAmount { .. } => "fixed_amount",
        }
    }
}

/// A coupon definition held by the coupon store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coupon {
    /// Normalized (uppercase) code.
    pub code: String,
    pub kind: CouponKind,
    pub active: bool,
}

impl Coupon {
    /// Normalizes a user-entered coupon code for lookup.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }
}

/// Result of resolving a coupon code against an amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponResolution {
    /// Coupon found and active.
    Applied {
        code: String,
        kind: CouponKind,
        discount: i64,
    },
    /// No coupon supplied, unknown code, or inactive coupon.
    NotFound,
}

impl CouponResolution {
    /// Resolves a looked-up coupon against `amount`.
    pub fn from_lookup(coupon: Option<Coupon>, amount: i64) -> Self {
        match coupon {
            Some(c) if c.active => CouponResolution::Applied {
                discount: c.kind.discount_for(amount),
                code: c.code,
                kind: c.kind,
            },
            _ => CouponResolution::NotFound,
        }
    }

    pub fn discount(&self) -> i64 {
        match self {
            CouponResolution::Applied { discount, .. } => *discount,
            CouponResolution::NotFound => 0,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            CouponResolution::Applied { code, .. } => Some(code),
            CouponResolution::NotFound => None,
        }
    }

    pub fn kind(&self) -> Option<CouponKind> {
        match self {
            CouponResolution::Applied { kind, .. } => Some(*kind),
            CouponResolution::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, CouponResolution::Applied { .. })
    }
}

/// Price breakdown after applying coupon then gift card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountBreakdown {
    pub original_amount: i64,
    pub coupon_discount: i64,
    pub gift_card_applied: i64,
    pub final_amount: i64,
}

impl DiscountBreakdown {
    /// Computes the breakdown.
    ///
    /// `gift_card_balance` is the available balance of a resolved gift
    /// card, if any. The gift card covers at most the post-coupon
    /// remainder.
    pub fn compute(
        original_amount: i64,
        coupon_discount: i64,
        gift_card_balance: Option<i64>,
    ) -> Result<Self, ValidationError> {
        validate_amount(original_amount)?;

        let coupon_discount = coupon_discount.clamp(0, original_amount);
        let remainder = original_amount - coupon_discount;
        let gift_card_applied = gift_card_balance
            .map(|balance| balance.clamp(0, remainder))
            .unwrap_or(0);
        let final_amount = (original_amount - coupon_discount - gift_card_applied).max(0);

        Ok(Self {
            original_amount,
            coupon_discount,
            gift_card_applied,
            final_amount,
        })
    }

    /// Total reduction from the original price.
    pub fn total_discount(&self) -> i64 {
        self.original_amount - self.final_amount
    }

    /// Returns true if discounts cover the whole price.
    pub fn is_fully_covered(&self) -> bool {
        self.final_amount == 0
    }
}

/// Validates a purchase amount in minor units.
pub fn validate_amount(amount: i64) -> Result<(), ValidationError> {
    if !(1..=MAX_AMOUNT).contains(&amount) {
        return Err(ValidationError::out_of_range("amount", 1, MAX_AMOUNT, amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn twenty_percent() -> CouponKind {
        CouponKind::Percentage { basis_points: 2000 }
    }

    #[test]
    fn coupon_then_gift_card_scenario() {
        let coupon = twenty_percent().discount_for(15_000);
        assert_eq!(coupon, 3_000);

        let breakdown = DiscountBreakdown::compute(15_000, coupon, Some(5_000)).unwrap();
        assert_eq!(breakdown.coupon_discount, 3_000);
        assert_eq!(breakdown.gift_card_applied, 5_000);
        assert_eq!(breakdown.final_amount, 7_000);
        assert_eq!(breakdown.total_discount(), 8_000);
    }

    #[test]
    fn gift_card_only_covers_remainder() {
        let breakdown = DiscountBreakdown::compute(10_000, 4_000, Some(50_000)).unwrap();
        assert_eq!(breakdown.gift_card_applied, 6_000);
        assert_eq!(breakdown.final_amount, 0);
        assert!(breakdown.is_fully_covered());
    }

    #[test]
    fn percentage_rounds_half_up() {
        // 15% of 999 = 149.85
        let kind = CouponKind::Percentage { basis_points: 1500 };
        assert_eq!(kind.discount_for(999), 150);
        // 12.5% of 4 = 0.5
        let kind = CouponKind::Percentage { basis_points: 1250 };
        assert_eq!(kind.discount_for(4), 1);
    }

    #[test]
    fn fixed_coupon_is_capped_at_amount() {
        let kind = CouponKind::FixedAmount { amount: 20_000 };
        assert_eq!(kind.discount_for(15_000), 15_000);
    }

    #[test]
    fn inactive_coupon_resolves_to_not_found() {
        let coupon = Coupon {
            code: "SPRING".into(),
            kind: twenty_percent(),
            active: false,
        };
        let resolution = CouponResolution::from_lookup(Some(coupon), 10_000);
        assert_eq!(resolution, CouponResolution::NotFound);
        assert_eq!(resolution.discount(), 0);
    }

    #[test]
    fn normalize_code_uppercases_and_trims() {
        assert_eq!(Coupon::normalize_code("  spring24 "), "SPRING24");
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(DiscountBreakdown::compute(0, 0, None).is_err());
        assert!(DiscountBreakdown::compute(-5, 0, None).is_err());
    }

    proptest! {
        #[test]
        fn final_amount_never_negative(
            amount in 1i64..=MAX_AMOUNT,
            bp in 0u32..=12_000,
            fixed in 0i64..=MAX_AMOUNT,
            use_percent in any::<bool>(),
            balance in proptest::option::of(0i64..=MAX_AMOUNT),
        ) {
            let kind = if use_percent {
                CouponKind::Percentage { basis_points: bp }
            } else {
                CouponKind::FixedAmount { amount: fixed }
            };
            let coupon = kind.discount_for(amount);
            let b = DiscountBreakdown::compute(amount, coupon, balance).unwrap();

            prop_assert!(b.final_amount >= 0);
            prop_assert_eq!(
                b.final_amount,
                (b.original_amount - b.coupon_discount - b.gift_card_applied).max(0)
            );
            prop_assert!(b.gift_card_applied <= balance.unwrap_or(0));
            prop_assert!(b.coupon_discount <= amount);
        }
    }
}
