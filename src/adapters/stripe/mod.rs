//! Stripe adapters: payments, Identity, and webhook verification.
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated against a 5-minute replay window
//! - API keys and signing secrets are held in `secrecy::SecretString`

mod client;
mod identity_adapter;
mod mock_payment_provider;
mod stripe_adapter;
mod webhook_types;
pub mod webhook_verifier;

pub use client::StripeClient;
pub use identity_adapter::StripeIdentityAdapter;
pub use mock_payment_provider::{MethodCall, MockIdentityVerifier, MockPaymentProvider};
pub use stripe_adapter::{StripeConfig, StripePaymentAdapter};
pub use webhook_types::{
    SignatureHeader, SignatureParseError, StripeCheckoutSession, StripeInvoice,
    StripeSubscription, StripeWebhookEvent,
};
