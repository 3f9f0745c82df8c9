//! Membership intent: one purchase attempt and its price provenance.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{BillingCycle, CouponResolution, DiscountBreakdown, MembershipType};
use crate::domain::foundation::{
    GiftCardId, IntentId, StateMachine, Timestamp, UserId, ValidationError,
};

/// Intent lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Created, awaiting payment.
    Initiated,

    /// Payment confirmed, activation preconditions not yet all met.
    PaidPendingVerification,

    /// Activated. Only the activation guard moves an intent here.
    Active,

    /// Unpaid and past its time-to-live.
    Expired,

    /// Superseded by a newer intent, or ended.
    Cancelled,
}

impl IntentStatus {
    /// Statuses a confirmed payment moves to `PaidPendingVerification`.
    ///
    /// A checkout opened before its intent was superseded or expired can
    /// still be paid; the member must not be left without activation.
    pub const ACCEPTS_PAYMENT: [IntentStatus; 3] = [
        IntentStatus::Initiated,
        IntentStatus::Cancelled,
        IntentStatus::Expired,
    ];
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Initiated => "initiated",
            IntentStatus::PaidPendingVerification => "paid_pending_verification",
            IntentStatus::Active => "active",
            IntentStatus::Expired => "expired",
            IntentStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true once payment for the intent has been confirmed.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            IntentStatus::PaidPendingVerification | IntentStatus::Active
        )
    }
}

impl FromStr for IntentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(IntentStatus::Initiated),
            "paid_pending_verification" => Ok(IntentStatus::PaidPendingVerification),
            "active" => Ok(IntentStatus::Active),
            "expired" => Ok(IntentStatus::Expired),
            "cancelled" => Ok(IntentStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "intent_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for IntentStatus {
    fn valid_transitions(&self) -> &'static [Self] {
        use IntentStatus::*;
        match self {
            Initiated => &[PaidPendingVerification, Cancelled, Expired],
            PaidPendingVerification => &[Active, Cancelled],
            Active => &[Cancelled, Expired],
            Cancelled | Expired => &[PaidPendingVerification],
        }
    }
}

/// A single purchase attempt.
///
/// `final_amount = max(0, original_amount - coupon_discount - gift_card_applied_amount)`
/// holds for every constructed intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipIntent {
    pub id: IntentId,
    pub user_id: UserId,
    pub membership_type: MembershipType,
    pub billing_cycle: BillingCycle,
    pub original_amount: i64,
    pub coupon_code: Option<String>,
    pub coupon_discount: i64,
    /// Weak reference; the card may later be disabled or exhausted.
    pub gift_card_id: Option<GiftCardId>,
    pub gift_card_applied_amount: i64,
    pub final_amount: i64,
    pub status: IntentStatus,
    /// Hosted checkout session opened for this intent, if any.
    pub checkout_session_id: Option<String>,
    pub initiated_at: Timestamp,
    pub verified_at: Option<Timestamp>,
    pub activated_at: Option<Timestamp>,
}

impl MembershipIntent {
    /// Creates a new `Initiated` intent from a computed breakdown.
    pub fn initiate(
        user_id: UserId,
        membership_type: MembershipType,
        billing_cycle: BillingCycle,
        coupon: &CouponResolution,
        gift_card_id: Option<GiftCardId>,
        breakdown: DiscountBreakdown,
    ) -> Self {
        let gift_card_id = gift_card_id.filter(|_| breakdown.gift_card_applied > 0);
        Self {
            id: IntentId::new(),
            user_id,
            membership_type,
            billing_cycle,
            original_amount: breakdown.original_amount,
            coupon_code: coupon.code().map(str::to_string),
            coupon_discount: breakdown.coupon_discount,
            gift_card_id,
            gift_card_applied_amount: if gift_card_id.is_some() {
                breakdown.gift_card_applied
            } else {
                0
            },
            final_amount: breakdown.final_amount,
            status: IntentStatus::Initiated,
            checkout_session_id: None,
            initiated_at: Timestamp::now(),
            verified_at: None,
            activated_at: None,
        }
    }

    /// Returns true if the user owns this intent.
    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Total discount applied to the original price.
    pub fn total_discount(&self) -> i64 {
        self.original_amount - self.final_amount
    }

    /// Returns true if discounts cover the whole price.
    pub fn is_fully_covered(&self) -> bool {
        self.final_amount == 0
    }

    /// Applies a validated transition in memory.
    pub fn transition(&mut self, target: IntentStatus) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::CouponKind;
    use proptest::prelude::*;

    fn all_statuses() -> [IntentStatus; 5] {
        use IntentStatus::*;
        [Initiated, PaidPendingVerification, Active, Expired, Cancelled]
    }

    fn test_intent(gift_card: Option<GiftCardId>, balance: Option<i64>) -> MembershipIntent {
        let coupon = CouponResolution::Applied {
            code: "SPRING".into(),
            kind: CouponKind::Percentage { basis_points: 2000 },
            discount: 3_000,
        };
        let breakdown = DiscountBreakdown::compute(15_000, coupon.discount(), balance).unwrap();
        MembershipIntent::initiate(
            UserId::new("user-1").unwrap(),
            MembershipType::Premium,
            BillingCycle::Annual,
            &coupon,
            gift_card,
            breakdown,
        )
    }

    #[test]
    fn initiate_records_provenance() {
        let gc = GiftCardId::new();
        let intent = test_intent(Some(gc), Some(5_000));
        assert_eq!(intent.status, IntentStatus::Initiated);
        assert_eq!(intent.coupon_code.as_deref(), Some("SPRING"));
        assert_eq!(intent.gift_card_id, Some(gc));
        assert_eq!(intent.gift_card_applied_amount, 5_000);
        assert_eq!(intent.final_amount, 7_000);
        assert_eq!(intent.total_discount(), 8_000);
    }

    #[test]
    fn empty_gift_card_is_not_referenced() {
        let intent = test_intent(Some(GiftCardId::new()), Some(0));
        assert_eq!(intent.gift_card_id, None);
        assert_eq!(intent.gift_card_applied_amount, 0);
    }

    #[test]
    fn initiated_moves_to_paid_pending() {
        let mut intent = test_intent(None, None);
        intent.transition(IntentStatus::PaidPendingVerification).unwrap();
        assert_eq!(intent.status, IntentStatus::PaidPendingVerification);
    }

    #[test]
    fn initiated_cannot_skip_to_active() {
        let mut intent = test_intent(None, None);
        assert!(intent.transition(IntentStatus::Active).is_err());
        assert_eq!(intent.status, IntentStatus::Initiated);
    }

    #[test]
    fn paid_pending_cannot_expire() {
        assert!(!IntentStatus::PaidPendingVerification.can_transition_to(&IntentStatus::Expired));
    }

    #[test]
    fn superseded_or_expired_intent_only_reopens_on_payment() {
        for status in [IntentStatus::Cancelled, IntentStatus::Expired] {
            assert_eq!(
                status.valid_transitions(),
                &[IntentStatus::PaidPendingVerification]
            );
            assert!(status.transition_to(IntentStatus::Active).is_err());
        }
    }

    #[test]
    fn every_payable_status_moves_to_paid_pending() {
        for status in IntentStatus::ACCEPTS_PAYMENT {
            assert!(status.can_transition_to(&IntentStatus::PaidPendingVerification));
        }
        assert!(!IntentStatus::Active.can_transition_to(&IntentStatus::PaidPendingVerification));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in all_statuses() {
            assert_eq!(status.as_str().parse::<IntentStatus>(), Ok(status));
        }
    }

    proptest! {
        #[test]
        fn no_transition_returns_to_initiated(from in 0usize..5, to in 0usize..5) {
            let from = all_statuses()[from];
            let to = all_statuses()[to];
            if to == IntentStatus::Initiated {
                prop_assert!(from.transition_to(to).is_err());
            }
        }

        #[test]
        fn transition_to_agrees_with_table(from in 0usize..5, to in 0usize..5) {
            let from = all_statuses()[from];
            let to = all_statuses()[to];
            prop_assert_eq!(from.transition_to(to).is_ok(), from.valid_transitions().contains(&to));
        }

        #[test]
        fn active_is_only_reachable_from_paid_pending(from in 0usize..5) {
            let from = all_statuses()[from];
            if from.can_transition_to(&IntentStatus::Active) {
                prop_assert_eq!(from, IntentStatus::PaidPendingVerification);
            }
        }
    }
}
