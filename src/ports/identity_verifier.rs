//! Identity verification provider port.
//!
//! Sessions carry the same correlation metadata as checkout, which is how a
//! verified session is matched back to an intent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::membership::{
    CorrelationMetadata, MembershipError, INTENT_ID_KEY, USER_ID_KEY,
};

/// Port for the identity verification provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Open a verification session for the member.
    async fn create_session(
        &self,
        request: CreateVerificationRequest,
    ) -> Result<VerificationSession, IdentityError>;

    /// Find a verified session whose metadata matches.
    ///
    /// Returns `None` when no session has completed verification.
    async fn find_verified_session(
        &self,
        correlation: &CorrelationMetadata,
    ) -> Result<Option<VerificationSession>, IdentityError>;
}

/// Request to open a verification session.
#[derive(Debug, Clone)]
pub struct CreateVerificationRequest {
    pub correlation: CorrelationMetadata,
    pub return_url: String,
}

/// Verification session state at the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    RequiresInput,
    Processing,
    Verified,
    Canceled,
}

impl VerificationStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "verified" => VerificationStatus::Verified,
            "processing" => VerificationStatus::Processing,
            "canceled" => VerificationStatus::Canceled,
            _ => VerificationStatus::RequiresInput,
        }
    }
}

/// A verification session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSession {
    pub id: String,
    pub status: VerificationStatus,
    /// Hosted verification page, present while input is required.
    pub url: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl VerificationSession {
    /// Returns true if this session belongs to the correlated user and,
    /// when both sides name an intent, to the same intent.
    pub fn matches(&self, correlation: &CorrelationMetadata) -> bool {
        let user_matches = self
            .metadata
            .get(USER_ID_KEY)
            .is_some_and(|u| u == correlation.user_id.as_str());
        let intent_matches = match (self.metadata.get(INTENT_ID_KEY), correlation.intent_id) {
            (Some(session_intent), Some(intent_id)) => *session_intent == intent_id.to_string(),
            _ => true,
        };
        user_matches && intent_matches
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}

/// Errors from the identity provider.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("Identity provider unreachable: {0}")]
    Network(String),

    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl IdentityError {
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<IdentityError> for MembershipError {
    fn from(err: IdentityError) -> Self {
        MembershipError::provider(err.to_string(), err.is_retryable())
    }
}
