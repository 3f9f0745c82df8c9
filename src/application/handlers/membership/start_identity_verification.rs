//! StartIdentityVerificationHandler - opens a hosted identity verification
//! session tagged with the same correlation metadata as checkout.

use std::sync::Arc;

use crate::domain::foundation::{IntentId, UserId};
use crate::domain::membership::{
    CorrelationMetadata, IntentStatus, MembershipError, MembershipIntent, Resource,
};
use crate::ports::{CreateVerificationRequest, IdentityVerifier, IntentRepository};

#[derive(Debug, Clone)]
pub struct StartIdentityVerificationCommand {
    pub user_id: UserId,
    /// Defaults to the member's latest open intent.
    pub intent_id: Option<IntentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartIdentityVerificationResult {
    pub session_id: String,
    pub url: Option<String>,
    pub intent_id: IntentId,
}

pub struct StartIdentityVerificationHandler {
    intents: Arc<dyn IntentRepository>,
    identity: Arc<dyn IdentityVerifier>,
    return_url: String,
}

impl StartIdentityVerificationHandler {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        identity: Arc<dyn IdentityVerifier>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            intents,
            identity,
            return_url: return_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: StartIdentityVerificationCommand,
    ) -> Result<StartIdentityVerificationResult, MembershipError> {
        // 1. Resolve the intent being verified for
        let intent = self.resolve_intent(&cmd).await?;
        if !matches!(
            intent.status,
            IntentStatus::Initiated | IntentStatus::PaidPendingVerification
        ) {
            return Err(MembershipError::validation(
                "intentId",
                format!("purchase is {}", intent.status.as_str()),
            ));
        }

        // 2. Open the session with correlation metadata
        let correlation = CorrelationMetadata::for_user(intent.user_id.clone())
            .with_intent(intent.id)
            .with_plan(intent.membership_type, intent.billing_cycle);
        let session = self
            .identity
            .create_session(CreateVerificationRequest {
                correlation,
                return_url: self.return_url.clone(),
            })
            .await?;

        tracing::info!(
            intent_id = %intent.id,
            verification_session_id = %session.id,
            "Identity verification started"
        );

        Ok(StartIdentityVerificationResult {
            session_id: session.id,
            url: session.url,
            intent_id: intent.id,
        })
    }

    async fn resolve_intent(
        &self,
        cmd: &StartIdentityVerificationCommand,
    ) -> Result<MembershipIntent, MembershipError> {
        let intent = match cmd.intent_id {
            Some(id) => self.intents.find_by_id(&id).await?,
            None => {
                self.intents
                    .find_latest_for_user(
                        &cmd.user_id,
                        &[IntentStatus::Initiated, IntentStatus::PaidPendingVerification],
                    )
                    .await?
            }
        }
        .ok_or(MembershipError::NotFound(Resource::Intent))?;

        if !intent.is_owner(&cmd.user_id) {
            return Err(MembershipError::Forbidden);
        }
        Ok(intent)
    }
}
