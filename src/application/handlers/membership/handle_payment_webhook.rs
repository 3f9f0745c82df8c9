//! HandlePaymentWebhookHandler - Command handler for inbound processor events.
//!
//! Events are triggers, not truth: every branch re-fetches the processor's
//! current snapshot before writing. Verified event ids are recorded in a
//! ledger once handled, so a redelivery short-circuits.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::membership::{
    BillingReason, CorrelationMetadata, IntentStatus, MembershipError, MembershipStatus,
    MembershipType, PaymentRecord, WebhookError,
};
use crate::ports::{
    CheckoutSessionSnapshot, IntentRepository, PaymentErrorCode, PaymentEvent,
    PaymentHistoryRepository, PaymentProvider, ProfileRepository, UserMembershipRepository,
    VerifiedEvent, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};

use super::{ActivationGuard, PaymentConfirmation};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// Webhook signature header.
    pub signature: String,
}

/// Handler for processor webhooks.
pub struct HandlePaymentWebhookHandler {
    provider: Arc<dyn PaymentProvider>,
    intents: Arc<dyn IntentRepository>,
    memberships: Arc<dyn UserMembershipRepository>,
    profiles: Arc<dyn ProfileRepository>,
    payments: Arc<dyn PaymentHistoryRepository>,
    webhook_events: Arc<dyn WebhookEventRepository>,
    confirmation: Arc<PaymentConfirmation>,
    guard: Arc<ActivationGuard>,
}

impl HandlePaymentWebhookHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        intents: Arc<dyn IntentRepository>,
        memberships: Arc<dyn UserMembershipRepository>,
        profiles: Arc<dyn ProfileRepository>,
        payments: Arc<dyn PaymentHistoryRepository>,
        webhook_events: Arc<dyn WebhookEventRepository>,
        confirmation: Arc<PaymentConfirmation>,
        guard: Arc<ActivationGuard>,
    ) -> Self {
        Self {
            provider,
            intents,
            memberships,
            profiles,
            payments,
            webhook_events,
            confirmation,
            guard,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<WebhookResult, WebhookError> {
        // 1. Verify signature and parse; fails closed
        let event = self
            .provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Webhook rejected");
                match e.code {
                    PaymentErrorCode::InvalidWebhook => WebhookError::InvalidSignature,
                    _ => WebhookError::Provider(e.message),
                }
            })?;

        // 2. Redelivery short-circuit
        if self
            .webhook_events
            .find_by_event_id(&event.id)
            .await
            .map_err(ledger_error)?
            .is_some()
        {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook already processed");
            return Ok(WebhookResult::AlreadyProcessed);
        }

        // 3. Reconcile
        match self.dispatch(&event).await {
            Ok(result) => {
                self.record(&event, &result).await?;
                Ok(result)
            }
            Err(err) => {
                let err = WebhookError::from(err);
                if err.is_acknowledged() {
                    tracing::warn!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        reason = %err,
                        "Webhook skipped"
                    );
                    let result = WebhookResult::Ignored(err.to_string());
                    self.record(&event, &result).await?;
                    Ok(result)
                } else {
                    // Not recorded, so redelivery retries it.
                    tracing::error!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %err,
                        "Webhook processing failed"
                    );
                    Err(err)
                }
            }
        }
    }

    async fn dispatch(&self, event: &VerifiedEvent) -> Result<WebhookResult, MembershipError> {
        match &event.payload {
            PaymentEvent::CheckoutCompleted { session } => self.checkout_completed(session).await,
            PaymentEvent::InvoicePaid {
                invoice_id,
                subscription_id,
                billing_reason,
            } => {
                self.invoice_paid(invoice_id, subscription_id.as_deref(), billing_reason)
                    .await
            }
            PaymentEvent::SubscriptionDeleted {
                subscription_id,
                metadata,
            } => self.subscription_deleted(subscription_id, metadata).await,
            PaymentEvent::IdentityVerified {
                verification_session_id,
                metadata,
            } => self.identity_verified(verification_session_id, metadata).await,
            PaymentEvent::Unknown => Ok(WebhookResult::Ignored(format!(
                "unhandled event type {}",
                event.event_type
            ))),
        }
    }

    async fn record(&self, event: &VerifiedEvent, result: &WebhookResult) -> Result<(), WebhookError> {
        let record = match result {
            WebhookResult::Ignored(reason) => WebhookEventRecord::ignored(
                &event.id,
                &event.event_type,
                reason,
                event.raw.clone(),
            ),
            _ => WebhookEventRecord::success(&event.id, &event.event_type, event.raw.clone()),
        };
        self.webhook_events
            .save(record)
            .await
            .map_err(ledger_error)?;
        Ok(())
    }

    async fn checkout_completed(
        &self,
        session: &CheckoutSessionSnapshot,
    ) -> Result<WebhookResult, MembershipError> {
        if !session.is_subscription() {
            return Ok(WebhookResult::Ignored("not a subscription checkout".into()));
        }
        if !session.is_paid() {
            return Ok(WebhookResult::Ignored("checkout not paid".into()));
        }

        let correlation = CorrelationMetadata::from_map(&session.metadata)?;
        let intent_id = correlation
            .intent_id
            .ok_or_else(|| MembershipError::correlation("metadata missing intent_id"))?;
        let intent = self
            .intents
            .find_by_id(&intent_id)
            .await?
            .ok_or_else(|| MembershipError::correlation(format!("unknown intent {}", intent_id)))?;
        if !intent.is_owner(&correlation.user_id) {
            return Err(MembershipError::correlation("intent belongs to another user"));
        }

        let fresh = self
            .provider
            .get_checkout_session(&session.id)
            .await?
            .ok_or_else(|| MembershipError::provider("checkout session not yet available", true))?;

        self.confirmation.confirm(&intent, &fresh).await?;
        let outcome = self.guard.activate(&intent.id).await?;

        tracing::info!(
            intent_id = %intent.id,
            user_id = %intent.user_id,
            outcome = ?outcome,
            "Checkout completed"
        );
        Ok(WebhookResult::Processed)
    }

    async fn invoice_paid(
        &self,
        invoice_id: &str,
        subscription_id: Option<&str>,
        billing_reason: &BillingReason,
    ) -> Result<WebhookResult, MembershipError> {
        if billing_reason.is_initial() {
            return Ok(WebhookResult::Ignored(
                "initial invoice handled by checkout".into(),
            ));
        }
        let Some(subscription_id) = subscription_id else {
            return Ok(WebhookResult::Ignored("invoice has no subscription".into()));
        };

        // Renewals never create memberships.
        let Some(mut membership) = self
            .memberships
            .find_by_subscription_id(subscription_id)
            .await?
        else {
            tracing::warn!(
                subscription_id = %subscription_id,
                invoice_id = %invoice_id,
                "Renewal for unknown subscription dropped"
            );
            return Ok(WebhookResult::Ignored(
                "no membership for subscription".into(),
            ));
        };

        let subscription = self
            .provider
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| MembershipError::provider("subscription not yet available", true))?;
        let invoice = self
            .provider
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| MembershipError::provider("invoice not yet available", true))?;

        membership.apply_snapshot(
            MembershipStatus::from_provider(&subscription.status)?,
            Timestamp::from_unix_secs(subscription.current_period_start),
            Timestamp::from_unix_secs(subscription.current_period_end),
        )?;
        self.memberships.upsert(&membership).await?;

        self.payments
            .upsert(&PaymentRecord {
                invoice_id: invoice.id,
                user_id: membership.user_id.clone(),
                intent_id: None,
                subscription_id: Some(subscription.id.clone()),
                amount: invoice.amount_paid,
                currency: invoice.currency,
                billing_reason: invoice.billing_reason,
                period_start: invoice.period_start.map(Timestamp::from_unix_secs),
                period_end: invoice.period_end.map(Timestamp::from_unix_secs),
                paid_at: Timestamp::now(),
            })
            .await?;

        self.sync_projection(&membership.user_id, membership.status, membership.membership_type)
            .await?;

        tracing::info!(
            user_id = %membership.user_id,
            subscription_id = %subscription.id,
            invoice_id = %invoice_id,
            status = membership.status.as_str(),
            "Membership renewed"
        );
        Ok(WebhookResult::Processed)
    }

    async fn subscription_deleted(
        &self,
        subscription_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<WebhookResult, MembershipError> {
        let correlation = CorrelationMetadata::from_map(metadata)?;

        let Some(mut membership) = self.memberships.find_by_user(&correlation.user_id).await?
        else {
            return Ok(WebhookResult::Ignored("no membership for user".into()));
        };
        if membership.external_subscription_id.as_deref() != Some(subscription_id) {
            return Ok(WebhookResult::Ignored(
                "subscription is not the member's current one".into(),
            ));
        }

        if let Some(snapshot) = self.provider.get_subscription(subscription_id).await? {
            if MembershipStatus::from_provider(&snapshot.status).ok()
                != Some(MembershipStatus::Cancelled)
            {
                return Ok(WebhookResult::Ignored(
                    "subscription still live at processor".into(),
                ));
            }
        }

        if membership.status != MembershipStatus::Cancelled {
            membership.cancel();
            self.memberships.upsert(&membership).await?;
        }
        self.sync_projection(
            &membership.user_id,
            MembershipStatus::Cancelled,
            membership.membership_type,
        )
        .await?;

        tracing::info!(
            user_id = %membership.user_id,
            subscription_id = %subscription_id,
            "Membership cancelled"
        );
        Ok(WebhookResult::Processed)
    }

    async fn identity_verified(
        &self,
        verification_session_id: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<WebhookResult, MembershipError> {
        let correlation = CorrelationMetadata::from_map(metadata)?;
        self.profiles
            .mark_identity_verified(&correlation.user_id, Timestamp::now())
            .await?;
        tracing::info!(
            user_id = %correlation.user_id,
            verification_session_id = %verification_session_id,
            "Identity verified"
        );

        let intent_id = match correlation.intent_id {
            Some(id) => Some(id),
            None => self
                .intents
                .find_latest_for_user(
                    &correlation.user_id,
                    &[IntentStatus::PaidPendingVerification],
                )
                .await?
                .map(|i| i.id),
        };
        if let Some(intent_id) = intent_id {
            let outcome = self.guard.activate(&intent_id).await?;
            tracing::info!(intent_id = %intent_id, outcome = ?outcome, "Activation checked after verification");
        }
        Ok(WebhookResult::Processed)
    }

    /// Updates the profile projection for members the guard already activated.
    async fn sync_projection(
        &self,
        user_id: &UserId,
        status: MembershipStatus,
        membership_type: MembershipType,
    ) -> Result<(), MembershipError> {
        let activated = self
            .profiles
            .find(user_id)
            .await?
            .is_some_and(|p| p.membership_status.is_some());
        if activated {
            self.profiles
                .update_membership_projection(user_id, status, membership_type)
                .await?;
        }
        Ok(())
    }
}

fn ledger_error(err: DomainError) -> WebhookError {
    WebhookError::Database(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{correlation, subscription, user, Fixture, CURRENCY};
    use super::*;
    use crate::adapters::stripe::MockPaymentProvider;
    use crate::domain::membership::{MembershipIntent, UserMembership};
    use crate::ports::{InvoiceSnapshot, PaymentError, WebhookOutcome};
    use serde_json::json;

    fn handler(fx: &Fixture) -> HandlePaymentWebhookHandler {
        handler_with(fx, fx.provider.clone())
    }

    fn handler_with(fx: &Fixture, provider: Arc<MockPaymentProvider>) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            provider,
            fx.intents.clone(),
            fx.memberships.clone(),
            fx.profiles.clone(),
            fx.payments.clone(),
            fx.webhook_events.clone(),
            fx.confirmation(),
            fx.guard(),
        )
    }

    fn command(event_id: &str, event_type: &str, object: serde_json::Value) -> HandlePaymentWebhookCommand {
        let body = json!({
            "id": event_id,
            "type": event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": object }
        });
        HandlePaymentWebhookCommand {
            payload: serde_json::to_vec(&body).unwrap(),
            signature: "t=0,v1=unused".into(),
        }
    }

    fn checkout_object(session: &CheckoutSessionSnapshot) -> serde_json::Value {
        json!({
            "id": session.id,
            "customer": session.customer_id,
            "subscription": session.subscription_id,
            "invoice": session.invoice_id,
            "payment_status": session.payment_status,
            "mode": session.mode,
            "amount_total": session.amount_total,
            "currency": session.currency,
            "metadata": session.metadata,
        })
    }

    fn invoice_object(id: &str, subscription: &str, reason: &str) -> serde_json::Value {
        json!({
            "id": id,
            "subscription": subscription,
            "amount_paid": 9900,
            "currency": CURRENCY,
            "billing_reason": reason,
            "period_start": 1_702_592_000,
            "period_end": 1_705_270_400,
            "paid": true,
        })
    }

    async fn paid_intent(fx: &Fixture, verified: bool) -> (MembershipIntent, CheckoutSessionSnapshot) {
        let u = user("u1");
        fx.ready_profile(&u, verified).await;
        let intent = fx.intent(&u, 9900, IntentStatus::Initiated).await;
        let session = fx.paid_checkout(&intent);
        (intent, session)
    }

    async fn seeded_membership(fx: &Fixture, subscription_id: &str) -> UserMembership {
        let start = Timestamp::from_unix_secs(1_700_000_000);
        let membership = UserMembership::new(
            user("u1"),
            Some(subscription_id.to_string()),
            MembershipType::Premium,
            MembershipStatus::Active,
            start,
            start.add_days(30),
        );
        fx.memberships.upsert(&membership).await.unwrap();
        membership
    }

    #[tokio::test]
    async fn checkout_completed_activates_verified_member() {
        let fx = Fixture::new();
        let (intent, session) = paid_intent(&fx, true).await;

        let result = handler(&fx)
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        let stored = fx.intents.find_by_id(&intent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Active);
        let membership = fx.memberships.find_by_user(&intent.user_id).await.unwrap().unwrap();
        assert_eq!(membership.status, MembershipStatus::Active);
        assert_eq!(fx.webhook_events.len().await, 1);
    }

    #[tokio::test]
    async fn checkout_completed_without_verification_stays_pending() {
        let fx = Fixture::new();
        let (intent, session) = paid_intent(&fx, false).await;

        handler(&fx)
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap();

        let stored = fx.intents.find_by_id(&intent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::PaidPendingVerification);
        assert_eq!(fx.profiles.projection_write_count(), 0);
    }

    #[tokio::test]
    async fn redelivered_event_is_short_circuited() {
        let fx = Fixture::new();
        let (_, session) = paid_intent(&fx, true).await;
        let handler = handler(&fx);
        let cmd = command("evt_1", "checkout.session.completed", checkout_object(&session));

        handler.handle(cmd.clone()).await.unwrap();
        let upserts = fx.memberships.upsert_count();
        let result = handler.handle(cmd).await.unwrap();

        assert_eq!(result, WebhookResult::AlreadyProcessed);
        assert_eq!(fx.memberships.upsert_count(), upserts);
    }

    #[tokio::test]
    async fn first_invoice_after_checkout_is_a_no_op() {
        let fx = Fixture::new();
        let (_, session) = paid_intent(&fx, true).await;
        let handler = handler(&fx);
        handler
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap();
        let upserts = fx.memberships.upsert_count();

        let result = handler
            .handle(command(
                "evt_2",
                "invoice.paid",
                invoice_object(
                    session.invoice_id.as_deref().unwrap(),
                    session.subscription_id.as_deref().unwrap(),
                    "subscription_create",
                ),
            ))
            .await
            .unwrap();

        assert!(matches!(result, WebhookResult::Ignored(_)));
        assert_eq!(fx.memberships.upsert_count(), upserts);
        assert_eq!(fx.payments.len().await, 1);
    }

    #[tokio::test]
    async fn renewal_updates_period_and_records_payment_once() {
        let fx = Fixture::new();
        seeded_membership(&fx, "sub_r").await;
        let mut renewed = subscription("sub_r", "active", HashMap::new());
        renewed.current_period_start = 1_702_592_000;
        renewed.current_period_end = 1_705_270_400;
        fx.provider.add_subscription(renewed);
        fx.provider.add_invoice(InvoiceSnapshot {
            id: "in_r2".into(),
            subscription_id: Some("sub_r".into()),
            amount_paid: 9900,
            currency: CURRENCY.into(),
            billing_reason: BillingReason::SubscriptionCycle,
            period_start: Some(1_702_592_000),
            period_end: Some(1_705_270_400),
            paid: true,
        });
        let handler = handler(&fx);

        for event_id in ["evt_a", "evt_b"] {
            let result = handler
                .handle(command(
                    event_id,
                    "invoice.paid",
                    invoice_object("in_r2", "sub_r", "subscription_cycle"),
                ))
                .await
                .unwrap();
            assert_eq!(result, WebhookResult::Processed);
        }

        assert_eq!(fx.payments.len().await, 1);
        let membership = fx.memberships.find_by_user(&user("u1")).await.unwrap().unwrap();
        assert_eq!(
            membership.period_end,
            Timestamp::from_unix_secs(1_705_270_400)
        );
    }

    #[tokio::test]
    async fn renewal_for_unknown_subscription_is_dropped() {
        let fx = Fixture::new();
        let result = handler(&fx)
            .handle(command(
                "evt_1",
                "invoice.paid",
                invoice_object("in_x", "sub_unknown", "subscription_cycle"),
            ))
            .await
            .unwrap();

        assert!(matches!(result, WebhookResult::Ignored(_)));
        assert!(fx.memberships.is_empty().await);
        assert!(fx.payments.is_empty().await);
    }

    #[tokio::test]
    async fn subscription_deleted_cancels_membership_only() {
        let fx = Fixture::new();
        let intent = fx.intent(&user("u1"), 9900, IntentStatus::Active).await;
        seeded_membership(&fx, "sub_d").await;
        fx.provider
            .add_subscription(subscription("sub_d", "canceled", correlation(&intent).to_map()));

        let result = handler(&fx)
            .handle(command(
                "evt_1",
                "customer.subscription.deleted",
                json!({
                    "id": "sub_d",
                    "customer": "cus_1",
                    "status": "canceled",
                    "current_period_start": 1_700_000_000,
                    "current_period_end": 1_702_592_000,
                    "metadata": correlation(&intent).to_map(),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        let membership = fx.memberships.find_by_user(&user("u1")).await.unwrap().unwrap();
        assert_eq!(membership.status, MembershipStatus::Cancelled);
        let stored = fx.intents.find_by_id(&intent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Active);
    }

    #[tokio::test]
    async fn missing_correlation_is_acknowledged_and_recorded() {
        let fx = Fixture::new();
        let (_, mut session) = paid_intent(&fx, true).await;
        session.metadata.clear();

        let result = handler(&fx)
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap();

        assert!(matches!(result, WebhookResult::Ignored(_)));
        assert_eq!(fx.webhook_events.len().await, 1);
        assert!(fx.memberships.is_empty().await);
    }

    #[tokio::test]
    async fn bad_signature_fails_closed() {
        let fx = Fixture::new();
        let (_, session) = paid_intent(&fx, true).await;
        let handler = handler_with(&fx, Arc::new(MockPaymentProvider::rejecting_webhooks()));

        let err = handler
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::InvalidSignature));
        assert!(fx.webhook_events.is_empty().await);
        assert!(fx.memberships.is_empty().await);
    }

    #[tokio::test]
    async fn provider_outage_is_not_recorded() {
        let fx = Fixture::new();
        let (_, session) = paid_intent(&fx, true).await;
        fx.provider.set_method_error(
            "get_checkout_session",
            PaymentError::network("reset"),
        );

        let err = handler(&fx)
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(fx.webhook_events.is_empty().await);
    }

    #[tokio::test]
    async fn permanent_provider_refusal_is_recorded_as_ignored() {
        let fx = Fixture::new();
        let (_, session) = paid_intent(&fx, true).await;
        fx.provider.set_method_error(
            "get_checkout_session",
            PaymentError::not_found("checkout session"),
        );

        let result = handler(&fx)
            .handle(command("evt_1", "checkout.session.completed", checkout_object(&session)))
            .await
            .unwrap();

        assert!(matches!(result, WebhookResult::Ignored(_)));
        let record = fx.webhook_events.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert!(fx.memberships.is_empty().await);
    }

    #[tokio::test]
    async fn identity_verified_activates_pending_intent() {
        let fx = Fixture::new();
        let (intent, session) = paid_intent(&fx, false).await;
        fx.confirmation().confirm(&intent, &session).await.unwrap();

        let result = handler(&fx)
            .handle(command(
                "evt_1",
                "identity.verification_session.verified",
                json!({
                    "id": "vs_1",
                    "status": "verified",
                    "metadata": correlation(&intent).to_map(),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(result, WebhookResult::Processed);
        let profile = fx.profiles.find(&intent.user_id).await.unwrap().unwrap();
        assert!(profile.identity_verified);
        let stored = fx.intents.find_by_id(&intent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IntentStatus::Active);
    }

    #[tokio::test]
    async fn unknown_event_type_is_ignored() {
        let fx = Fixture::new();
        let result = handler(&fx)
            .handle(command("evt_1", "customer.created", json!({ "id": "cus_1" })))
            .await
            .unwrap();
        assert!(matches!(result, WebhookResult::Ignored(_)));
    }
}
