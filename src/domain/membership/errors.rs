//! Membership-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Authentication | 401 |
//! | Validation | 400 |
//! | SignatureVerification | 400 |
//! | Correlation | 200 (webhook ack) |
//! | PreconditionNotMet | 200 (pending) |
//! | ExternalProvider | 502 |
//! | NotFound | 404 |
//! | Forbidden | 403 |
//! | Infrastructure | 500 |
//!
//! Messages are safe to show to members: they never carry processor or
//! internal identifiers.

use super::{CorrelationError, GiftCardError, PreconditionFailure};
use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Resources that can be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Intent,
    Membership,
    GiftCard,
    Profile,
}

impl Resource {
    fn label(&self) -> &'static str {
        match self {
            Resource::Intent => "Purchase",
            Resource::Membership => "Membership",
            Resource::GiftCard => "Gift card",
            Resource::Profile => "Profile",
        }
    }
}

/// Membership-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// No authenticated user for a call that needs one.
    Authentication,

    /// Input rejected before any write.
    Validation { field: String, message: String },

    /// Inbound event failed authenticity checks.
    SignatureVerification(String),

    /// Event metadata does not map to an internal user or intent.
    Correlation(String),

    /// Activation gate not satisfied. Not a fault.
    PreconditionNotMet(PreconditionFailure),

    /// Payment or identity provider call failed.
    ExternalProvider { message: String, retryable: bool },

    NotFound(Resource),

    /// Caller does not own the resource.
    Forbidden,

    Infrastructure(String),
}

impl MembershipError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn correlation(message: impl Into<String>) -> Self {
        MembershipError::Correlation(message.into())
    }

    pub fn provider(message: impl Into<String>, retryable: bool) -> Self {
        MembershipError::ExternalProvider {
            message: message.into(),
            retryable,
        }
    }

    pub fn not_found(resource: Resource) -> Self {
        MembershipError::NotFound(resource)
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        MembershipError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::Authentication => ErrorCode::Unauthorized,
            MembershipError::Validation { .. } => ErrorCode::ValidationFailed,
            MembershipError::SignatureVerification(_) => ErrorCode::InvalidWebhookSignature,
            MembershipError::Correlation(_) => ErrorCode::MissingCorrelation,
            MembershipError::PreconditionNotMet(_) => ErrorCode::PreconditionNotMet,
            MembershipError::ExternalProvider { .. } => ErrorCode::ExternalServiceError,
            MembershipError::NotFound(Resource::Intent) => ErrorCode::IntentNotFound,
            MembershipError::NotFound(Resource::Membership) => ErrorCode::MembershipNotFound,
            MembershipError::NotFound(Resource::GiftCard) => ErrorCode::GiftCardNotFound,
            MembershipError::NotFound(Resource::Profile) => ErrorCode::ProfileNotFound,
            MembershipError::Forbidden => ErrorCode::Forbidden,
            MembershipError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            MembershipError::Authentication => "Sign in to continue".to_string(),
            MembershipError::Validation { field, message } => {
                format!("Invalid '{}': {}", field, message)
            }
            MembershipError::SignatureVerification(_) => "Invalid event signature".to_string(),
            MembershipError::Correlation(_) => "Event could not be matched".to_string(),
            MembershipError::PreconditionNotMet(failure) => {
                format!("Membership pending: {}", failure)
            }
            MembershipError::ExternalProvider { .. } => {
                "Payment service is unavailable, please try again".to_string()
            }
            MembershipError::NotFound(resource) => format!("{} not found", resource.label()),
            MembershipError::Forbidden => "Not allowed".to_string(),
            MembershipError::Infrastructure(_) => "Something went wrong".to_string(),
        }
    }

    /// Internal detail for logs. May contain identifiers.
    pub fn detail(&self) -> String {
        match self {
            MembershipError::SignatureVerification(d)
            | MembershipError::Correlation(d)
            | MembershipError::Infrastructure(d)
            | MembershipError::ExternalProvider { message: d, .. } => d.clone(),
            other => other.message(),
        }
    }

    /// Returns true if the caller may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            MembershipError::ExternalProvider { retryable, .. } => *retryable,
            MembershipError::Infrastructure(_) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail())
    }
}

impl std::error::Error for MembershipError {}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => MembershipError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::IntentNotFound => MembershipError::NotFound(Resource::Intent),
            ErrorCode::MembershipNotFound => MembershipError::NotFound(Resource::Membership),
            ErrorCode::GiftCardNotFound => MembershipError::NotFound(Resource::GiftCard),
            ErrorCode::ProfileNotFound => MembershipError::NotFound(Resource::Profile),
            ErrorCode::Forbidden => MembershipError::Forbidden,
            ErrorCode::Unauthorized => MembershipError::Authentication,
            _ => MembershipError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for MembershipError {
    fn from(err: ValidationError) -> Self {
        MembershipError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<GiftCardError> for MembershipError {
    fn from(err: GiftCardError) -> Self {
        MembershipError::validation("gift_card", err.to_string())
    }
}

impl From<CorrelationError> for MembershipError {
    fn from(err: CorrelationError) -> Self {
        MembershipError::Correlation(err.to_string())
    }
}

impl From<MembershipError> for DomainError {
    fn from(err: MembershipError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
