//! Payment provider port for the external payment processor.
//!
//! Covers customer creation, hosted checkout, authoritative snapshot
//! retrieval, and verification of inbound webhook events.
//!
//! # Design
//!
//! - **Snapshots over payloads**: handlers re-fetch subscriptions and
//!   invoices instead of trusting event bodies
//! - **Tagged events**: inbound events parse into [`PaymentEvent`]; unknown
//!   types become [`PaymentEvent::Unknown`] and are acknowledged

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::membership::{BillingReason, MembershipError};

/// Port for payment processor integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a billing customer. Returns the processor's customer id.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Open a hosted subscription checkout session.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Retrieve a checkout session by id.
    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionSnapshot>, PaymentError>;

    /// Retrieve the current subscription snapshot.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, PaymentError>;

    /// Retrieve an invoice.
    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<InvoiceSnapshot>, PaymentError>;

    /// Create a single-use amount-off coupon.
    async fn create_coupon(&self, request: CreateCouponRequest)
        -> Result<ProcessorCoupon, PaymentError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Fails closed: any doubt about authenticity is an error.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<VerifiedEvent, PaymentError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user id, stored as customer metadata.
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// Idempotency key for safe retries.
    pub idempotency_key: Option<String>,
}

/// Customer in the payment system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
}

/// Request to open a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    pub customer_id: String,
    /// Processor price for the chosen plan.
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Correlation metadata, set on both session and subscription.
    pub metadata: HashMap<String, String>,
    /// Processor coupon carrying the intent's discount.
    pub coupon_id: Option<String>,
    pub idempotency_key: Option<String>,
}

/// Newly opened checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted page the member is redirected to.
    pub url: String,
}

/// Checkout session as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionSnapshot {
    pub id: String,
    /// `subscription`, `payment` or `setup`.
    pub mode: String,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub invoice_id: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionSnapshot {
    /// Returns true if the session settled.
    pub fn is_paid(&self) -> bool {
        matches!(self.payment_status.as_str(), "paid" | "no_payment_required")
    }

    pub fn is_subscription(&self) -> bool {
        self.mode == "subscription"
    }
}

/// Subscription as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer_id: String,
    /// Raw processor status (`active`, `past_due`, `canceled`, ...).
    pub status: String,
    /// Unix seconds.
    pub current_period_start: i64,
    /// Unix seconds.
    pub current_period_end: i64,
    pub metadata: HashMap<String, String>,
}

/// Invoice as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub id: String,
    pub subscription_id: Option<String>,
    pub amount_paid: i64,
    pub currency: String,
    pub billing_reason: BillingReason,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    pub paid: bool,
}

/// Request to create a one-time discount coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCouponRequest {
    pub amount_off: i64,
    pub currency: String,
    pub name: String,
    pub idempotency_key: Option<String>,
}

/// Coupon created at the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorCoupon {
    pub id: String,
}

/// A webhook event whose signature has been verified.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    /// Processor event id (evt_xxx).
    pub id: String,
    /// Raw event type string.
    pub event_type: String,
    /// Unix seconds.
    pub created: i64,
    pub livemode: bool,
    pub payload: PaymentEvent,
    /// Original body, kept for the processed-event ledger.
    pub raw: serde_json::Value,
}

/// Inbound events the engine reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// `checkout.session.completed`
    CheckoutCompleted { session: CheckoutSessionSnapshot },

    /// `invoice.paid` / `invoice.payment_succeeded`
    InvoicePaid {
        invoice_id: String,
        subscription_id: Option<String>,
        billing_reason: BillingReason,
    },

    /// `customer.subscription.deleted`
    SubscriptionDeleted {
        subscription_id: String,
        metadata: HashMap<String, String>,
    },

    /// `identity.verification_session.verified`
    IdentityVerified {
        verification_session_id: String,
        metadata: HashMap<String, String>,
    },

    /// Any other event type. Acknowledged without action.
    Unknown,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    /// Processor's own error code, if any.
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::AuthenticationError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidWebhook, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::InvalidWebhook => ErrorCode::InvalidWebhookSignature,
            _ => ErrorCode::ExternalServiceError,
        };
        DomainError::new(code, err.message)
    }
}

impl From<PaymentError> for MembershipError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidWebhook => MembershipError::SignatureVerification(err.message),
            _ => MembershipError::provider(err.message, err.retryable),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    AuthenticationError,
    NotFound,
    RateLimitExceeded,
    InvalidWebhook,
    InvalidRequest,
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidWebhook => "invalid_webhook",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}
