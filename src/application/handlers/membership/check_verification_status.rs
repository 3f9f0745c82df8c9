//! CheckVerificationStatusHandler - client-driven fallback for activation.
//!
//! Webhooks have no delivery deadline the client can see, so the client
//! polls this instead. It asks the providers directly and then runs the same
//! confirmation and guard the webhook path would.

use std::sync::Arc;

use crate::domain::foundation::{IntentId, Timestamp, UserId};
use crate::domain::membership::{
    ActivationOutcome, CorrelationMetadata, IntentStatus, MembershipError, MembershipIntent,
    PreconditionFailure, Resource,
};
use crate::ports::{IdentityVerifier, IntentRepository, PaymentProvider, ProfileRepository};

use super::{ActivationGuard, PaymentConfirmation};

/// Query for an intent's verification status.
#[derive(Debug, Clone)]
pub struct CheckVerificationStatusQuery {
    pub caller: UserId,
    pub intent_id: Option<IntentId>,
    /// Defaults to the caller. Only the caller's own intents are visible.
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationStatusResult {
    pub intent_id: IntentId,
    /// Identity verification state of the member.
    pub verified: bool,
    pub status: IntentStatus,
    pub active: bool,
    /// Why activation is still pending, if it is.
    pub pending_reason: Option<PreconditionFailure>,
}

pub struct CheckVerificationStatusHandler {
    intents: Arc<dyn IntentRepository>,
    profiles: Arc<dyn ProfileRepository>,
    provider: Arc<dyn PaymentProvider>,
    identity: Arc<dyn IdentityVerifier>,
    confirmation: Arc<PaymentConfirmation>,
    guard: Arc<ActivationGuard>,
}

impl CheckVerificationStatusHandler {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        profiles: Arc<dyn ProfileRepository>,
        provider: Arc<dyn PaymentProvider>,
        identity: Arc<dyn IdentityVerifier>,
        confirmation: Arc<PaymentConfirmation>,
        guard: Arc<ActivationGuard>,
    ) -> Self {
        Self {
            intents,
            profiles,
            provider,
            identity,
            confirmation,
            guard,
        }
    }

    pub async fn handle(
        &self,
        query: CheckVerificationStatusQuery,
    ) -> Result<VerificationStatusResult, MembershipError> {
        let mut intent = self.resolve_intent(&query).await?;
        let mut pending_reason = None;

        // Payment may have landed without its webhook
        if IntentStatus::ACCEPTS_PAYMENT.contains(&intent.status) {
            if let Some(session_id) = intent.checkout_session_id.clone() {
                if let Some(session) = self.provider.get_checkout_session(&session_id).await? {
                    if session.is_paid() {
                        self.confirmation.confirm(&intent, &session).await?;
                        intent = self.reload(&intent.id).await?;
                    }
                }
            }
        }

        if intent.status == IntentStatus::PaidPendingVerification {
            self.sync_identity(&intent).await?;
            match self.guard.activate(&intent.id).await? {
                ActivationOutcome::PreconditionNotMet(failure) => pending_reason = Some(failure),
                outcome => {
                    tracing::info!(intent_id = %intent.id, outcome = ?outcome, "Poller ran activation");
                }
            }
            intent = self.reload(&intent.id).await?;
        }

        let verified = self
            .profiles
            .find(&intent.user_id)
            .await?
            .is_some_and(|p| p.identity_verified);

        Ok(VerificationStatusResult {
            intent_id: intent.id,
            verified,
            status: intent.status,
            active: intent.status == IntentStatus::Active,
            pending_reason,
        })
    }

    async fn resolve_intent(
        &self,
        query: &CheckVerificationStatusQuery,
    ) -> Result<MembershipIntent, MembershipError> {
        if let Some(intent_id) = query.intent_id {
            let intent = self.reload(&intent_id).await?;
            if !intent.is_owner(&query.caller) {
                return Err(MembershipError::Forbidden);
            }
            return Ok(intent);
        }

        let user_id = query.user_id.as_ref().unwrap_or(&query.caller);
        if user_id != &query.caller {
            return Err(MembershipError::Forbidden);
        }
        // A paid intent waiting on activation wins over a newer draft
        if let Some(pending) = self
            .intents
            .find_latest_for_user(user_id, &[IntentStatus::PaidPendingVerification])
            .await?
        {
            return Ok(pending);
        }
        self.intents
            .find_latest_for_user(user_id, &[IntentStatus::Initiated, IntentStatus::Active])
            .await?
            .ok_or(MembershipError::NotFound(Resource::Intent))
    }

    /// Pulls a verified identity session from the provider if the profile
    /// has not heard about one yet.
    async fn sync_identity(&self, intent: &MembershipIntent) -> Result<(), MembershipError> {
        let Some(profile) = self.profiles.find(&intent.user_id).await? else {
            return Ok(());
        };
        if profile.identity_verified {
            return Ok(());
        }

        let correlation = CorrelationMetadata::for_user(intent.user_id.clone()).with_intent(intent.id);
        if let Some(session) = self.identity.find_verified_session(&correlation).await? {
            self.profiles
                .mark_identity_verified(&intent.user_id, Timestamp::now())
                .await?;
            tracing::info!(
                intent_id = %intent.id,
                verification_session_id = %session.id,
                "Identity verification found by poll"
            );
        }
        Ok(())
    }

    async fn reload(&self, intent_id: &IntentId) -> Result<MembershipIntent, MembershipError> {
        self.intents
            .find_by_id(intent_id)
            .await?
            .ok_or(MembershipError::NotFound(Resource::Intent))
    }
}
