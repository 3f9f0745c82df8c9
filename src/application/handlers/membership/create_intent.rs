//! CreateIntentHandler - Command handler for starting a purchase attempt.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::membership::{
    BillingCycle, CouponResolution, MembershipError, MembershipIntent, MembershipType,
};
use crate::ports::IntentRepository;

use super::DiscountLedger;

/// Command to create a purchase intent.
#[derive(Debug, Clone)]
pub struct CreateIntentCommand {
    /// `None` for guest callers, which cannot hold intents.
    pub user_id: Option<UserId>,
    pub membership_type: MembershipType,
    pub billing_cycle: BillingCycle,
    pub amount: i64,
    pub coupon_code: Option<String>,
    pub gift_card_code: Option<String>,
}

/// Result of intent creation.
#[derive(Debug, Clone)]
pub struct CreateIntentResult {
    pub intent: MembershipIntent,
    /// Number of earlier drafts this intent replaced.
    pub superseded: u64,
    pub coupon: CouponResolution,
}

/// Handler for creating purchase intents.
///
/// Prices are resolved but nothing is debited: gift card balance only moves
/// once payment is confirmed, so abandoned checkouts cost nothing.
pub struct CreateIntentHandler {
    intents: Arc<dyn IntentRepository>,
    ledger: Arc<DiscountLedger>,
}

impl CreateIntentHandler {
    pub fn new(intents: Arc<dyn IntentRepository>, ledger: Arc<DiscountLedger>) -> Self {
        Self { intents, ledger }
    }

    pub async fn handle(
        &self,
        cmd: CreateIntentCommand,
    ) -> Result<CreateIntentResult, MembershipError> {
        // 1. Guests cannot hold intents
        let user_id = cmd.user_id.ok_or(MembershipError::Authentication)?;

        // 2. Validate and price before any write
        let quote = self
            .ledger
            .quote(
                cmd.amount,
                non_blank(cmd.coupon_code.as_deref()),
                non_blank(cmd.gift_card_code.as_deref()),
            )
            .await?;

        // 3. Persist, replacing any live draft in the same step
        let intent = MembershipIntent::initiate(
            user_id,
            cmd.membership_type,
            cmd.billing_cycle,
            &quote.coupon,
            quote.gift_card.map(|g| g.id),
            quote.breakdown,
        );
        let superseded = self.intents.replace_initiated(&intent).await?;

        tracing::info!(
            intent_id = %intent.id,
            user_id = %intent.user_id,
            membership_type = %intent.membership_type,
            original_amount = intent.original_amount,
            final_amount = intent.final_amount,
            superseded,
            "Membership intent created"
        );

        Ok(CreateIntentResult {
            intent,
            superseded,
            coupon: quote.coupon,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{user, Fixture};
    use super::*;
    use crate::domain::membership::{Coupon, CouponKind, IntentStatus};

    fn handler(fx: &Fixture) -> CreateIntentHandler {
        CreateIntentHandler::new(fx.intents.clone(), fx.ledger())
    }

    fn command(user_id: Option<UserId>, amount: i64) -> CreateIntentCommand {
        CreateIntentCommand {
            user_id,
            membership_type: MembershipType::Premium,
            billing_cycle: BillingCycle::Annual,
            amount,
            coupon_code: None,
            gift_card_code: None,
        }
    }

    #[tokio::test]
    async fn guest_caller_is_rejected_without_writes() {
        let fx = Fixture::new();
        let result = handler(&fx).handle(command(None, 15000)).await;

        assert_eq!(result.unwrap_err(), MembershipError::Authentication);
        assert!(fx.intents.all().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_amount_is_rejected_before_write() {
        let fx = Fixture::new();
        let result = handler(&fx).handle(command(Some(user("u1")), -5)).await;

        assert!(matches!(result, Err(MembershipError::Validation { .. })));
        assert!(fx.intents.all().await.is_empty());
    }

    #[tokio::test]
    async fn intent_records_coupon_and_gift_card_provenance() {
        let fx = Fixture::new();
        fx.coupons
            .put(Coupon {
                code: "SPRING".into(),
                kind: CouponKind::Percentage { basis_points: 2000 },
                active: true,
            })
            .await;
        let card = fx.add_gift_card("GIFT-50", 5000).await;

        let mut cmd = command(Some(user("u1")), 15000);
        cmd.coupon_code = Some("spring".into());
        cmd.gift_card_code = Some("gift-50".into());
        let result = handler(&fx).handle(cmd).await.unwrap();

        let intent = result.intent;
        assert_eq!(intent.status, IntentStatus::Initiated);
        assert_eq!(intent.coupon_code.as_deref(), Some("SPRING"));
        assert_eq!(intent.coupon_discount, 3000);
        assert_eq!(intent.gift_card_id, Some(card.id));
        assert_eq!(intent.gift_card_applied_amount, 5000);
        assert_eq!(intent.final_amount, 7000);
        assert!(fx.gift_cards.transactions().await.is_empty());
    }

    #[tokio::test]
    async fn new_intent_supersedes_previous_draft() {
        let fx = Fixture::new();
        let handler = handler(&fx);

        let first = handler.handle(command(Some(user("u1")), 1000)).await.unwrap();
        let second = handler.handle(command(Some(user("u1")), 2000)).await.unwrap();

        assert_eq!(second.superseded, 1);
        let stored = fx.intents.find_by_id(&first.intent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Cancelled);
        assert_eq!(
            fx.intents.find_by_id(&second.intent.id).await.unwrap().unwrap().status,
            IntentStatus::Initiated
        );
    }

    #[tokio::test]
    async fn concurrent_creates_leave_one_live_draft() {
        let fx = Fixture::new();
        let handler = handler(&fx);

        let (a, b) = tokio::join!(
            handler.handle(command(Some(user("u1")), 1000)),
            handler.handle(command(Some(user("u1")), 2000)),
        );
        let superseded = a.unwrap().superseded + b.unwrap().superseded;

        assert_eq!(superseded, 1);
        let live = fx
            .intents
            .all()
            .await
            .into_iter()
            .filter(|i| i.status == IntentStatus::Initiated)
            .count();
        assert_eq!(live, 1);
    }

    #[tokio::test]
    async fn fully_covered_intent_is_valid() {
        let fx = Fixture::new();
        fx.add_gift_card("BIG", 50_000).await;

        let mut cmd = command(Some(user("u1")), 15000);
        cmd.gift_card_code = Some("BIG".into());
        let result = handler(&fx).handle(cmd).await.unwrap();

        assert_eq!(result.intent.final_amount, 0);
        assert_eq!(result.intent.gift_card_applied_amount, 15000);
    }

    #[tokio::test]
    async fn unknown_codes_leave_price_unchanged() {
        let fx = Fixture::new();
        let mut cmd = command(Some(user("u1")), 15000);
        cmd.coupon_code = Some("NOPE".into());
        cmd.gift_card_code = Some("  ".into());
        let result = handler(&fx).handle(cmd).await.unwrap();

        assert!(!result.coupon.is_found());
        assert_eq!(result.intent.final_amount, 15000);
        assert_eq!(result.intent.gift_card_id, None);
    }
}
