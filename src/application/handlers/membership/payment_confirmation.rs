//! PaymentConfirmation - shared reconciliation of a paid checkout.
//!
//! Run by both the webhook path and the status poller before the
//! activation guard. Every step is keyed on a stable external id, so running
//! it twice for the same checkout has the effect of running it once.
//!
//! A paid checkout reopens an intent that was superseded or expired while
//! the checkout page was still open, so the payment can still activate.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::membership::{
    BillingReason, DebitAmount, IntentStatus, MembershipError, MembershipIntent, MembershipStatus,
    PaymentRecord, UserMembership,
};
use crate::ports::{
    CheckoutSessionSnapshot, IntentRepository, PaymentHistoryRepository, PaymentProvider,
    SubscriptionSnapshot, UserMembershipRepository,
};

use super::DiscountLedger;

/// What a confirmation changed.
#[derive(Debug, Clone)]
pub struct ConfirmationOutcome {
    pub membership: UserMembership,
    /// True if this call moved the intent to `paid_pending_verification`.
    pub transitioned: bool,
}

pub struct PaymentConfirmation {
    intents: Arc<dyn IntentRepository>,
    memberships: Arc<dyn UserMembershipRepository>,
    payments: Arc<dyn PaymentHistoryRepository>,
    ledger: Arc<DiscountLedger>,
    provider: Arc<dyn PaymentProvider>,
    currency: String,
}

impl PaymentConfirmation {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        memberships: Arc<dyn UserMembershipRepository>,
        payments: Arc<dyn PaymentHistoryRepository>,
        ledger: Arc<DiscountLedger>,
        provider: Arc<dyn PaymentProvider>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            intents,
            memberships,
            payments,
            ledger,
            provider,
            currency: currency.into(),
        }
    }

    pub async fn confirm(
        &self,
        intent: &MembershipIntent,
        session: &CheckoutSessionSnapshot,
    ) -> Result<ConfirmationOutcome, MembershipError> {
        if !session.is_paid() {
            return Err(MembershipError::validation("checkout", "session is not paid"));
        }
        // 1. Mirror the authoritative subscription
        let subscription = self.fetch_subscription(session).await?;
        let membership = self.upsert_membership(intent, &subscription).await?;

        // 2. Payment history, keyed by invoice id
        self.record_payment(intent, session, &subscription).await?;

        // 3. Gift card portion
        self.debit_gift_card(intent).await?;

        // 4. Conditional move to `paid_pending_verification`
        let transitioned = self.mark_paid(intent, &session.id).await?;

        if transitioned {
            tracing::info!(
                intent_id = %intent.id,
                user_id = %intent.user_id,
                subscription_id = %subscription.id,
                "Payment confirmed, awaiting verification"
            );
        } else {
            tracing::debug!(intent_id = %intent.id, "Payment already confirmed");
        }

        Ok(ConfirmationOutcome {
            membership,
            transitioned,
        })
    }

    /// Compare-and-set from whichever payable status the intent is in.
    async fn mark_paid(
        &self,
        intent: &MembershipIntent,
        checkout_session_id: &str,
    ) -> Result<bool, MembershipError> {
        let now = Timestamp::now();
        for from in IntentStatus::ACCEPTS_PAYMENT {
            let moved = self
                .intents
                .transition(&intent.id, from, IntentStatus::PaidPendingVerification, now)
                .await?;
            if moved {
                if from != IntentStatus::Initiated {
                    tracing::warn!(
                        intent_id = %intent.id,
                        user_id = %intent.user_id,
                        checkout_session_id = %checkout_session_id,
                        previous_status = from.as_str(),
                        "Payment reopened a closed intent"
                    );
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn fetch_subscription(
        &self,
        session: &CheckoutSessionSnapshot,
    ) -> Result<SubscriptionSnapshot, MembershipError> {
        let subscription_id = session
            .subscription_id
            .as_deref()
            .ok_or_else(|| MembershipError::validation("checkout", "session has no subscription"))?;
        self.provider
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| MembershipError::provider("subscription not yet available", true))
    }

    async fn upsert_membership(
        &self,
        intent: &MembershipIntent,
        subscription: &SubscriptionSnapshot,
    ) -> Result<UserMembership, MembershipError> {
        let status = MembershipStatus::from_provider(&subscription.status)?;
        let period_start = Timestamp::from_unix_secs(subscription.current_period_start);
        let period_end = Timestamp::from_unix_secs(subscription.current_period_end);

        let existing = self.memberships.find_by_user(&intent.user_id).await?;
        let membership = match existing {
            Some(mut current)
                if current.external_subscription_id.as_deref() == Some(subscription.id.as_str()) =>
            {
                current.apply_snapshot(status, period_start, period_end)?;
                current.membership_type = intent.membership_type;
                current
            }
            _ => UserMembership::new(
                intent.user_id.clone(),
                Some(subscription.id.clone()),
                intent.membership_type,
                status,
                period_start,
                period_end,
            ),
        };
        self.memberships.upsert(&membership).await?;
        Ok(membership)
    }

    async fn record_payment(
        &self,
        intent: &MembershipIntent,
        session: &CheckoutSessionSnapshot,
        subscription: &SubscriptionSnapshot,
    ) -> Result<(), MembershipError> {
        let record = match session.invoice_id.as_deref() {
            Some(invoice_id) => {
                let invoice = self
                    .provider
                    .get_invoice(invoice_id)
                    .await?
                    .ok_or_else(|| MembershipError::provider("invoice not yet available", true))?;
                PaymentRecord {
                    invoice_id: invoice.id,
                    user_id: intent.user_id.clone(),
                    intent_id: Some(intent.id),
                    subscription_id: Some(subscription.id.clone()),
                    amount: invoice.amount_paid,
                    currency: invoice.currency,
                    billing_reason: invoice.billing_reason,
                    period_start: invoice.period_start.map(Timestamp::from_unix_secs),
                    period_end: invoice.period_end.map(Timestamp::from_unix_secs),
                    paid_at: Timestamp::now(),
                }
            }
            // No invoice when the first charge was zeroed out.
            None => PaymentRecord {
                invoice_id: session.id.clone(),
                user_id: intent.user_id.clone(),
                intent_id: Some(intent.id),
                subscription_id: Some(subscription.id.clone()),
                amount: session.amount_total.unwrap_or(intent.final_amount),
                currency: session
                    .currency
                    .clone()
                    .unwrap_or_else(|| self.currency.clone()),
                billing_reason: BillingReason::CheckoutSession,
                period_start: Some(Timestamp::from_unix_secs(subscription.current_period_start)),
                period_end: Some(Timestamp::from_unix_secs(subscription.current_period_end)),
                paid_at: Timestamp::now(),
            },
        };
        self.payments.upsert(&record).await?;
        Ok(())
    }

    async fn debit_gift_card(&self, intent: &MembershipIntent) -> Result<(), MembershipError> {
        let Some(gift_card_id) = intent.gift_card_id else {
            return Ok(());
        };
        if intent.gift_card_applied_amount <= 0 {
            return Ok(());
        }

        let result = self
            .ledger
            .apply_gift_card(
                &gift_card_id,
                &intent.user_id,
                DebitAmount::UpTo(intent.gift_card_applied_amount),
                &intent.id.order_reference(),
            )
            .await;
        match result {
            Ok(debit) if debit.amount_used < intent.gift_card_applied_amount => {
                tracing::warn!(
                    intent_id = %intent.id,
                    gift_card_id = %gift_card_id,
                    expected = intent.gift_card_applied_amount,
                    amount_used = debit.amount_used,
                    "Gift card covered less than quoted"
                );
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(err) if err.is_retryable() => Err(err),
            // The card was spent or disabled after quoting; payment stands.
            Err(err) => {
                tracing::warn!(
                    intent_id = %intent.id,
                    gift_card_id = %gift_card_id,
                    error = %err,
                    "Gift card debit failed after payment"
                );
                Ok(())
            }
        }
    }
}
