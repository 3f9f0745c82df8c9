//! OpenCheckoutHandler - Command handler for opening a hosted checkout.

use std::sync::Arc;

use crate::domain::foundation::{IntentId, UserId};
use crate::domain::membership::{
    CorrelationMetadata, IntentStatus, MembershipError, MembershipIntent, Resource,
};
use crate::ports::{
    CreateCheckoutRequest, CreateCouponRequest, CreateCustomerRequest, IntentRepository,
    PaymentProvider, ProfileRepository,
};

/// URLs and currency used for every checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub success_url: String,
    pub cancel_url: String,
    pub currency: String,
}

/// Command to open checkout for an intent.
#[derive(Debug, Clone)]
pub struct OpenCheckoutCommand {
    pub user_id: UserId,
    pub email: String,
    pub intent_id: IntentId,
    /// Processor price for the intent's plan.
    pub price_id: String,
}

/// Result of opening checkout.
#[derive(Debug, Clone)]
pub struct OpenCheckoutResult {
    pub session_id: String,
    pub redirect_url: String,
}

/// Handler for opening hosted checkout sessions.
///
/// The session carries the intent's correlation metadata, which every later
/// processor event echoes back. Membership status is never touched here.
pub struct OpenCheckoutHandler {
    intents: Arc<dyn IntentRepository>,
    profiles: Arc<dyn ProfileRepository>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
}

impl OpenCheckoutHandler {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        profiles: Arc<dyn ProfileRepository>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            intents,
            profiles,
            provider,
            settings,
        }
    }

    pub async fn handle(
        &self,
        cmd: OpenCheckoutCommand,
    ) -> Result<OpenCheckoutResult, MembershipError> {
        // 1. Validate input
        let price_id = cmd.price_id.trim();
        if price_id.is_empty() {
            return Err(MembershipError::validation("priceId", "is required"));
        }

        // 2. Load and authorize the intent
        let intent = self
            .intents
            .find_by_id(&cmd.intent_id)
            .await?
            .ok_or(MembershipError::NotFound(Resource::Intent))?;
        if !intent.is_owner(&cmd.user_id) {
            return Err(MembershipError::Forbidden);
        }
        if intent.status != IntentStatus::Initiated {
            return Err(MembershipError::validation(
                "intentId",
                format!("purchase is {}", intent.status.as_str()),
            ));
        }
        if intent.is_fully_covered() && intent.gift_card_id.is_some() {
            return Err(MembershipError::validation(
                "intentId",
                "purchase is covered by a gift card, redeem it instead",
            ));
        }

        // 3. Billing customer, created once and cached on the profile
        let customer_id = self.billing_customer(&cmd.user_id, &cmd.email).await?;

        // 4. Carry the intent's discount into the processor
        let coupon_id = self.discount_coupon(&intent).await?;

        // 5. Open the session
        let correlation = CorrelationMetadata::for_user(intent.user_id.clone())
            .with_intent(intent.id)
            .with_plan(intent.membership_type, intent.billing_cycle);
        let session = self
            .provider
            .create_checkout_session(CreateCheckoutRequest {
                customer_id,
                price_id: price_id.to_string(),
                success_url: self.settings.success_url.clone(),
                cancel_url: self.settings.cancel_url.clone(),
                metadata: correlation.to_map(),
                coupon_id,
                idempotency_key: Some(format!("checkout:{}", intent.id)),
            })
            .await?;

        self.intents
            .set_checkout_session(&intent.id, &session.id)
            .await?;

        tracing::info!(
            intent_id = %intent.id,
            user_id = %intent.user_id,
            checkout_session_id = %session.id,
            final_amount = intent.final_amount,
            "Checkout session opened"
        );

        Ok(OpenCheckoutResult {
            session_id: session.id,
            redirect_url: session.url,
        })
    }

    async fn billing_customer(&self, user_id: &UserId, email: &str) -> Result<String, MembershipError> {
        let profile = self
            .profiles
            .find(user_id)
            .await?
            .ok_or(MembershipError::NotFound(Resource::Profile))?;
        if let Some(existing) = profile.billing_customer_id {
            return Ok(existing);
        }

        let customer = self
            .provider
            .create_customer(CreateCustomerRequest {
                user_id: user_id.clone(),
                email: email.to_string(),
                name: profile.legal_name,
                idempotency_key: Some(format!("customer:{}", user_id)),
            })
            .await?;

        // A concurrent request may have stored a different handle first.
        let stored = self
            .profiles
            .set_billing_customer_if_absent(user_id, &customer.id)
            .await?;
        if stored != customer.id {
            tracing::debug!(user_id = %user_id, "Billing customer already cached, reusing");
        }
        Ok(stored)
    }

    async fn discount_coupon(
        &self,
        intent: &MembershipIntent,
    ) -> Result<Option<String>, MembershipError> {
        let amount_off = intent.total_discount();
        if amount_off <= 0 {
            return Ok(None);
        }
        let coupon = self
            .provider
            .create_coupon(CreateCouponRequest {
                amount_off,
                currency: self.settings.currency.clone(),
                name: match intent.coupon_code.as_deref() {
                    Some(code) => format!("Membership discount {}", code),
                    None => "Membership discount".to_string(),
                },
                idempotency_key: Some(format!("coupon:{}", intent.id)),
            })
            .await?;
        Ok(Some(coupon.id))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{user, Fixture, CURRENCY};
    use super::*;
    use crate::domain::membership::{
        BillingCycle, CouponKind, CouponResolution, DiscountBreakdown, MemberProfile,
        MembershipType, INTENT_ID_KEY, USER_ID_KEY,
    };
    use crate::ports::PaymentError;

    fn handler(fx: &Fixture) -> OpenCheckoutHandler {
        OpenCheckoutHandler::new(
            fx.intents.clone(),
            fx.profiles.clone(),
            fx.provider.clone(),
            CheckoutSettings {
                success_url: "https://app.example.test/welcome".into(),
                cancel_url: "https://app.example.test/plans".into(),
                currency: CURRENCY.into(),
            },
        )
    }

    fn command(user_id: &UserId, intent_id: IntentId) -> OpenCheckoutCommand {
        OpenCheckoutCommand {
            user_id: user_id.clone(),
            email: "member@example.test".into(),
            intent_id,
            price_id: "price_premium_monthly".into(),
        }
    }

    #[tokio::test]
    async fn opens_session_with_correlation_metadata() {
        let fx = Fixture::new();
        let u = user("u1");
        fx.profiles.put(MemberProfile::new(u.clone())).await;
        let intent = fx.intent(&u, 9900, IntentStatus::Initiated).await;

        let result = handler(&fx).handle(command(&u, intent.id)).await.unwrap();

        assert!(result.redirect_url.contains(&result.session_id));
        let requests = fx.provider.checkout_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].metadata[USER_ID_KEY], "u1");
        assert_eq!(requests[0].metadata[INTENT_ID_KEY], intent.id.to_string());
        assert_eq!(requests[0].coupon_id, None);

        let stored = fx.intents.find_by_id(&intent.id).await.unwrap().unwrap();
        assert_eq!(stored.checkout_session_id, Some(result.session_id));
        assert_eq!(stored.status, IntentStatus::Initiated);
    }

    #[tokio::test]
    async fn billing_customer_is_created_once() {
        let fx = Fixture::new();
        let u = user("u1");
        fx.profiles.put(MemberProfile::new(u.clone())).await;
        let handler = handler(&fx);

        let first = fx.intent(&u, 9900, IntentStatus::Initiated).await;
        handler.handle(command(&u, first.id)).await.unwrap();
        let second = fx.intent(&u, 9900, IntentStatus::Initiated).await;
        handler.handle(command(&u, second.id)).await.unwrap();

        assert_eq!(fx.provider.call_count("create_customer"), 1);
        let requests = fx.provider.checkout_requests();
        assert_eq!(requests[0].customer_id, requests[1].customer_id);
    }

    #[tokio::test]
    async fn discount_is_carried_as_processor_coupon() {
        let fx = Fixture::new();
        let u = user("u1");
        fx.profiles.put(MemberProfile::new(u.clone())).await;
        let coupon = CouponResolution::Applied {
            code: "SPRING".into(),
            kind: CouponKind::Percentage { basis_points: 2000 },
            discount: 3000,
        };
        let intent = MembershipIntent::initiate(
            u.clone(),
            MembershipType::Premium,
            BillingCycle::Annual,
            &coupon,
            None,
            DiscountBreakdown::compute(15000, 3000, None).unwrap(),
        );
        fx.intents.put(intent.clone()).await;

        handler(&fx).handle(command(&u, intent.id)).await.unwrap();

        let coupons = fx.provider.created_coupons();
        assert_eq!(coupons.len(), 1);
        assert_eq!(coupons[0].amount_off, 3000);
        assert_eq!(coupons[0].currency, CURRENCY);
        assert!(fx.provider.checkout_requests()[0].coupon_id.is_some());
    }

    #[tokio::test]
    async fn other_users_intent_is_forbidden() {
        let fx = Fixture::new();
        let owner = user("owner");
        let intent = fx.intent(&owner, 9900, IntentStatus::Initiated).await;

        let result = handler(&fx).handle(command(&user("intruder"), intent.id)).await;
        assert_eq!(result.unwrap_err(), MembershipError::Forbidden);
        assert!(fx.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn gift_card_covered_intent_cannot_check_out() {
        let fx = Fixture::new();
        let u = user("u1");
        fx.profiles.put(MemberProfile::new(u.clone())).await;
        let card = fx.add_gift_card("FULL", 5000).await;
        let intent = fx.gift_card_intent(&u, &card).await;

        let result = handler(&fx).handle(command(&u, intent.id)).await;
        assert!(matches!(result, Err(MembershipError::Validation { .. })));
    }

    #[tokio::test]
    async fn non_initiated_intent_is_rejected() {
        let fx = Fixture::new();
        let u = user("u1");
        let intent = fx.intent(&u, 9900, IntentStatus::Expired).await;

        let result = handler(&fx).handle(command(&u, intent.id)).await;
        assert!(matches!(result, Err(MembershipError::Validation { .. })));
    }

    #[tokio::test]
    async fn missing_intent_is_not_found() {
        let fx = Fixture::new();
        let result = handler(&fx).handle(command(&user("u1"), IntentId::new())).await;
        assert_eq!(result.unwrap_err(), MembershipError::NotFound(Resource::Intent));
    }

    #[tokio::test]
    async fn provider_failure_is_retryable_and_writes_nothing() {
        let fx = Fixture::new();
        let u = user("u1");
        fx.profiles.put(MemberProfile::new(u.clone())).await;
        let intent = fx.intent(&u, 9900, IntentStatus::Initiated).await;
        fx.provider
            .set_method_error("create_checkout_session", PaymentError::network("timeout"));

        let err = handler(&fx).handle(command(&u, intent.id)).await.unwrap_err();
        assert!(err.is_retryable());
        let stored = fx.intents.find_by_id(&intent.id).await.unwrap().unwrap();
        assert_eq!(stored.checkout_session_id, None);
    }
}
