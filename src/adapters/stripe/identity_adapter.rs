//! Stripe Identity adapter for the [`IdentityVerifier`] port.

use async_trait::async_trait;

use crate::domain::membership::CorrelationMetadata;
use crate::ports::{
    CreateVerificationRequest, IdentityError, IdentityVerifier, PaymentError, PaymentErrorCode,
    VerificationSession,
};

use super::client::StripeClient;
use super::stripe_adapter::{metadata_params, StripeConfig};
use super::webhook_types::{StripeList, StripeVerificationSession};

/// Verified sessions scanned per lookup.
const LIST_LIMIT: &str = "100";

pub struct StripeIdentityAdapter {
    client: StripeClient,
}

impl StripeIdentityAdapter {
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        Ok(Self {
            client: config.client()?,
        })
    }
}

fn identity_error(err: PaymentError) -> IdentityError {
    match err.code {
        PaymentErrorCode::NetworkError => IdentityError::Network(err.message),
        _ => IdentityError::Provider(err.message),
    }
}

#[async_trait]
impl IdentityVerifier for StripeIdentityAdapter {
    async fn create_session(
        &self,
        request: CreateVerificationRequest,
    ) -> Result<VerificationSession, IdentityError> {
        let mut params = vec![
            ("type".to_string(), "document".to_string()),
            ("return_url".to_string(), request.return_url.clone()),
        ];
        params.extend(metadata_params("metadata", &request.correlation.to_map()));

        let idempotency_key = request
            .correlation
            .intent_id
            .map(|id| format!("identity:{}", id));

        let session: StripeVerificationSession = self
            .client
            .post_form(
                "/v1/identity/verification_sessions",
                &params,
                idempotency_key.as_deref(),
            )
            .await
            .map_err(identity_error)?;

        tracing::info!(
            user_id = %request.correlation.user_id,
            verification_session_id = %session.id,
            "Identity verification session created"
        );
        Ok(session.into())
    }

    async fn find_verified_session(
        &self,
        correlation: &CorrelationMetadata,
    ) -> Result<Option<VerificationSession>, IdentityError> {
        let list: Option<StripeList<StripeVerificationSession>> = self
            .client
            .get(
                "/v1/identity/verification_sessions",
                &[("status", "verified"), ("limit", LIST_LIMIT)],
            )
            .await
            .map_err(identity_error)?;

        Ok(list.and_then(|list| {
            list.data
                .into_iter()
                .map(VerificationSession::from)
                .find(|s| s.is_verified() && s.matches(correlation))
        }))
    }
}
