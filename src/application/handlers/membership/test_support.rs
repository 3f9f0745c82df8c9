//! Shared fixtures for membership handler tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::memory::{
    InMemoryCouponStore, InMemoryGiftCardStore, InMemoryIntentRepository,
    InMemoryPaymentHistoryRepository, InMemoryProfileRepository,
    InMemoryUserMembershipRepository, InMemoryWebhookEventRepository,
};
use crate::adapters::stripe::{MockIdentityVerifier, MockPaymentProvider};
use crate::domain::foundation::{GiftCardId, Timestamp, UserId};
use crate::domain::membership::{
    complete_profile, BillingCycle, BillingReason, CorrelationMetadata, CouponResolution,
    DiscountBreakdown, GiftCard, GiftCardCode, GiftCardStatus, IntentStatus, MemberProfile,
    MembershipIntent, MembershipType,
};
use crate::ports::{CheckoutSessionSnapshot, InvoiceSnapshot, SubscriptionSnapshot};

use super::{ActivationGuard, DiscountLedger, PaymentConfirmation};

pub const CURRENCY: &str = "usd";

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub struct Fixture {
    pub intents: Arc<InMemoryIntentRepository>,
    pub memberships: Arc<InMemoryUserMembershipRepository>,
    pub profiles: Arc<InMemoryProfileRepository>,
    pub coupons: Arc<InMemoryCouponStore>,
    pub gift_cards: Arc<InMemoryGiftCardStore>,
    pub payments: Arc<InMemoryPaymentHistoryRepository>,
    pub webhook_events: Arc<InMemoryWebhookEventRepository>,
    pub provider: Arc<MockPaymentProvider>,
    pub identity: Arc<MockIdentityVerifier>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            intents: Arc::new(InMemoryIntentRepository::new()),
            memberships: Arc::new(InMemoryUserMembershipRepository::new()),
            profiles: Arc::new(InMemoryProfileRepository::new()),
            coupons: Arc::new(InMemoryCouponStore::new()),
            gift_cards: Arc::new(InMemoryGiftCardStore::new()),
            payments: Arc::new(InMemoryPaymentHistoryRepository::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            provider: Arc::new(MockPaymentProvider::new()),
            identity: Arc::new(MockIdentityVerifier::new()),
        }
    }

    pub fn ledger(&self) -> Arc<DiscountLedger> {
        Arc::new(DiscountLedger::new(
            self.coupons.clone(),
            self.gift_cards.clone(),
        ))
    }

    pub fn guard(&self) -> Arc<ActivationGuard> {
        Arc::new(ActivationGuard::new(
            self.intents.clone(),
            self.profiles.clone(),
            self.memberships.clone(),
            self.payments.clone(),
            self.gift_cards.clone(),
        ))
    }

    pub fn confirmation(&self) -> Arc<PaymentConfirmation> {
        Arc::new(PaymentConfirmation::new(
            self.intents.clone(),
            self.memberships.clone(),
            self.payments.clone(),
            self.ledger(),
            self.provider.clone(),
            CURRENCY,
        ))
    }

    /// Stores a complete profile, optionally identity-verified.
    pub async fn ready_profile(&self, user_id: &UserId, verified: bool) -> MemberProfile {
        let mut profile = complete_profile(user_id.clone());
        if verified {
            profile.identity_verified = true;
            profile.identity_verified_at = Some(Timestamp::now());
        }
        self.profiles.put(profile.clone()).await;
        profile
    }

    pub async fn add_gift_card(&self, code: &str, balance: i64) -> GiftCard {
        let card = GiftCard {
            id: GiftCardId::new(),
            code: GiftCardCode::new(code).unwrap(),
            balance,
            status: GiftCardStatus::Active,
            expires_at: None,
        };
        self.gift_cards.put(card.clone()).await;
        card
    }

    /// Stores an intent for `amount` with no discounts in `status`.
    pub async fn intent(
        &self,
        user_id: &UserId,
        amount: i64,
        status: IntentStatus,
    ) -> MembershipIntent {
        let breakdown = DiscountBreakdown::compute(amount, 0, None).unwrap();
        let mut intent = MembershipIntent::initiate(
            user_id.clone(),
            MembershipType::Premium,
            BillingCycle::Monthly,
            &CouponResolution::NotFound,
            None,
            breakdown,
        );
        intent.status = status;
        self.intents.put(intent.clone()).await;
        intent
    }

    /// Stores an Initiated intent fully paid by `card`.
    pub async fn gift_card_intent(&self, user_id: &UserId, card: &GiftCard) -> MembershipIntent {
        let breakdown = DiscountBreakdown::compute(card.balance, 0, Some(card.balance)).unwrap();
        let intent = MembershipIntent::initiate(
            user_id.clone(),
            MembershipType::Basic,
            BillingCycle::Annual,
            &CouponResolution::NotFound,
            Some(card.id),
            breakdown,
        );
        self.intents.put(intent.clone()).await;
        intent
    }

    /// Scripts a paid checkout for `intent` backed by an active
    /// subscription and an initial invoice.
    pub fn paid_checkout(&self, intent: &MembershipIntent) -> CheckoutSessionSnapshot {
        let session_id = format!("cs_{}", intent.id.as_uuid().simple());
        let subscription_id = format!("sub_{}", intent.id.as_uuid().simple());
        let invoice_id = format!("in_{}", intent.id.as_uuid().simple());
        let metadata = correlation(intent).to_map();

        self.provider.add_subscription(subscription(&subscription_id, "active", metadata.clone()));
        self.provider.add_invoice(InvoiceSnapshot {
            id: invoice_id.clone(),
            subscription_id: Some(subscription_id.clone()),
            amount_paid: intent.final_amount,
            currency: CURRENCY.to_string(),
            billing_reason: BillingReason::SubscriptionCreate,
            period_start: Some(1_700_000_000),
            period_end: Some(1_702_592_000),
            paid: true,
        });
        let session = CheckoutSessionSnapshot {
            id: session_id,
            mode: "subscription".to_string(),
            payment_status: "paid".to_string(),
            customer_id: Some("cus_1".to_string()),
            subscription_id: Some(subscription_id),
            invoice_id: Some(invoice_id),
            amount_total: Some(intent.final_amount),
            currency: Some(CURRENCY.to_string()),
            metadata,
        };
        self.provider.add_checkout_session(session.clone());
        session
    }
}

pub fn correlation(intent: &MembershipIntent) -> CorrelationMetadata {
    CorrelationMetadata::for_user(intent.user_id.clone())
        .with_intent(intent.id)
        .with_plan(intent.membership_type, intent.billing_cycle)
}

pub fn subscription(
    id: &str,
    status: &str,
    metadata: HashMap<String, String>,
) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        id: id.to_string(),
        customer_id: "cus_1".to_string(),
        status: status.to_string(),
        current_period_start: 1_700_000_000,
        current_period_end: 1_702_592_000,
        metadata,
    }
}
