//! Webhook error types for payment event ingestion.
//!
//! Status codes drive the processor's redelivery: 2xx acknowledges, 4xx
//! rejects without retry, 5xx asks for redelivery.

use axum::http::StatusCode;
use thiserror::Error;

use super::MembershipError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing or signature mismatch.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp too far in the future.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Payload or signature header could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Event metadata does not identify a user or intent.
    #[error("Missing correlation: {0}")]
    MissingCorrelation(String),

    /// Event intentionally not acted on.
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Processor call made while reconciling failed.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the processor should redeliver.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Provider(_) | WebhookError::Database(_))
    }

    /// Returns true if the event should be recorded as handled.
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingCorrelation(_) | WebhookError::Ignored(_)
        )
    }

    /// Maps the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_) => StatusCode::BAD_REQUEST,

            // Logged and skipped; redelivery would not help.
            WebhookError::MissingCorrelation(_) | WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::Provider(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<MembershipError> for WebhookError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::SignatureVerification(msg) => WebhookError::ParseError(msg),
            MembershipError::Correlation(msg) => WebhookError::MissingCorrelation(msg),
            MembershipError::ExternalProvider {
                message,
                retryable: true,
            } => WebhookError::Provider(message),
            // Redelivery cannot fix a permanent provider refusal
            MembershipError::ExternalProvider {
                message,
                retryable: false,
            } => WebhookError::Ignored(message),
            MembershipError::Infrastructure(msg) => WebhookError::Database(msg),
            other => WebhookError::Ignored(other.detail()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::Resource;

    #[test]
    fn signature_failures_are_client_errors() {
        assert_eq!(WebhookError::InvalidSignature.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert!(!WebhookError::InvalidSignature.is_retryable());
    }

    #[test]
    fn correlation_failure_is_acknowledged() {
        let err = WebhookError::MissingCorrelation("user_id".into());
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(err.is_acknowledged());
    }

    #[test]
    fn database_failure_requests_redelivery() {
        let err = WebhookError::Database("timeout".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
        assert!(!err.is_acknowledged());
    }

    #[test]
    fn membership_errors_map_to_webhook_errors() {
        assert!(matches!(
            WebhookError::from(MembershipError::correlation("x")),
            WebhookError::MissingCorrelation(_)
        ));
        assert!(matches!(
            WebhookError::from(MembershipError::provider("x", true)),
            WebhookError::Provider(_)
        ));
        assert!(matches!(
            WebhookError::from(MembershipError::not_found(Resource::Membership)),
            WebhookError::Ignored(_)
        ));
    }

    #[test]
    fn permanent_provider_failure_is_acknowledged() {
        let err = WebhookError::from(MembershipError::provider("No such subscription", false));
        assert!(matches!(err, WebhookError::Ignored(_)));
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(err.is_acknowledged());
        assert!(!err.is_retryable());
    }
}
