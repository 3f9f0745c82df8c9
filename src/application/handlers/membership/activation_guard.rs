//! ActivationGuard - the only code path that makes a membership active.
//!
//! Invoked after a webhook (push) or a status poll (pull). The intent moves
//! `paid_pending_verification -> active` through a compare-and-set, so when
//! both paths race only the winner writes the activation side effects.

use std::sync::Arc;

use crate::domain::foundation::{IntentId, Timestamp};
use crate::domain::membership::{
    ActivationOutcome, ActivationPreconditions, IntentStatus, MemberProfile, MembershipError,
    MembershipIntent, MembershipStatus, Resource, UserMembership,
};
use crate::ports::{
    GiftCardStore, IntentRepository, PaymentHistoryRepository, ProfileRepository,
    UserMembershipRepository,
};

pub struct ActivationGuard {
    intents: Arc<dyn IntentRepository>,
    profiles: Arc<dyn ProfileRepository>,
    memberships: Arc<dyn UserMembershipRepository>,
    payments: Arc<dyn PaymentHistoryRepository>,
    gift_cards: Arc<dyn GiftCardStore>,
}

impl ActivationGuard {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        profiles: Arc<dyn ProfileRepository>,
        memberships: Arc<dyn UserMembershipRepository>,
        payments: Arc<dyn PaymentHistoryRepository>,
        gift_cards: Arc<dyn GiftCardStore>,
    ) -> Self {
        Self {
            intents,
            profiles,
            memberships,
            payments,
            gift_cards,
        }
    }

    /// Checks preconditions and activates the intent if they all hold.
    ///
    /// Unmet preconditions are not an error: the intent stays pending and
    /// the outcome says why.
    pub async fn activate(&self, intent_id: &IntentId) -> Result<ActivationOutcome, MembershipError> {
        let intent = self
            .intents
            .find_by_id(intent_id)
            .await?
            .ok_or(MembershipError::NotFound(Resource::Intent))?;

        match intent.status {
            IntentStatus::Active => return Ok(ActivationOutcome::AlreadyActive),
            IntentStatus::PaidPendingVerification => {}
            other => return Ok(ActivationOutcome::NotEligible(other)),
        }

        // 1-3. Profile, identity, payment, in that order
        let profile = self
            .profiles
            .find(&intent.user_id)
            .await?
            .unwrap_or_else(|| MemberProfile::new(intent.user_id.clone()));
        let has_payment_evidence = self.has_payment_evidence(&intent).await?;
        let check = ActivationPreconditions {
            profile: &profile,
            has_payment_evidence,
        }
        .check();
        if let Err(failure) = check {
            tracing::info!(
                intent_id = %intent.id,
                user_id = %intent.user_id,
                reason = failure.code(),
                "Activation deferred"
            );
            return Ok(ActivationOutcome::PreconditionNotMet(failure));
        }

        // 4. Compare-and-set; only the winner writes side effects
        let now = Timestamp::now();
        let won = self
            .intents
            .transition(
                &intent.id,
                IntentStatus::PaidPendingVerification,
                IntentStatus::Active,
                now,
            )
            .await?;
        if !won {
            let current = self
                .intents
                .find_by_id(&intent.id)
                .await?
                .map(|i| i.status)
                .unwrap_or(intent.status);
            tracing::debug!(intent_id = %intent.id, status = current.as_str(), "Activation lost race");
            return Ok(match current {
                IntentStatus::Active => ActivationOutcome::AlreadyActive,
                other => ActivationOutcome::NotEligible(other),
            });
        }

        self.write_membership(&intent, now).await?;
        self.profiles
            .update_membership_projection(
                &intent.user_id,
                MembershipStatus::Active,
                intent.membership_type,
            )
            .await?;

        tracing::info!(
            intent_id = %intent.id,
            user_id = %intent.user_id,
            membership_type = %intent.membership_type,
            "Membership activated"
        );
        Ok(ActivationOutcome::Activated)
    }

    async fn has_payment_evidence(&self, intent: &MembershipIntent) -> Result<bool, MembershipError> {
        if self.payments.exists_for_intent(&intent.id).await? {
            return Ok(true);
        }
        if !intent.is_fully_covered() {
            return Ok(false);
        }
        match intent.gift_card_id {
            Some(gift_card_id) => Ok(self
                .gift_cards
                .find_transaction(&gift_card_id, &intent.id.order_reference())
                .await?
                .is_some()),
            // Zero price with no gift card: the coupon covered it all.
            None => Ok(true),
        }
    }

    async fn write_membership(
        &self,
        intent: &MembershipIntent,
        now: Timestamp,
    ) -> Result<(), MembershipError> {
        let membership = match self.memberships.find_by_user(&intent.user_id).await? {
            Some(mut existing) => {
                if existing.status != MembershipStatus::Active {
                    existing.apply_snapshot(
                        MembershipStatus::Active,
                        existing.period_start,
                        existing.period_end,
                    )?;
                }
                existing.membership_type = intent.membership_type;
                existing.updated_at = now;
                existing
            }
            None => UserMembership::new(
                intent.user_id.clone(),
                None,
                intent.membership_type,
                MembershipStatus::Active,
                now,
                intent.billing_cycle.period_end_from(now),
            ),
        };
        self.memberships.upsert(&membership).await?;
        Ok(())
    }
}
