//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the membership engine and the outside world. Adapters implement them.
//!
//! ## Provider Ports
//!
//! - `PaymentProvider` - Checkout, snapshots, webhook verification
//! - `IdentityVerifier` - Identity verification sessions
//! - `SessionValidator` - Access token validation
//!
//! ## Store Ports
//!
//! - `IntentRepository` - Purchase intents with compare-and-set transitions
//! - `UserMembershipRepository` - Current plan per user
//! - `ProfileRepository` - Profile subset and membership projection
//! - `CouponStore`, `GiftCardStore` - Discount sources
//! - `PaymentHistoryRepository` - Payments keyed by invoice id
//! - `WebhookEventRepository` - Processed event ledger

mod coupon_store;
mod gift_card_store;
mod identity_verifier;
mod intent_repository;
mod payment_history_repository;
mod payment_provider;
mod profile_repository;
mod session_validator;
mod user_membership_repository;
mod webhook_event_repository;

pub use coupon_store::CouponStore;
pub use gift_card_store::GiftCardStore;
pub use identity_verifier::{
    CreateVerificationRequest, IdentityError, IdentityVerifier, VerificationSession,
    VerificationStatus,
};
pub use intent_repository::IntentRepository;
pub use payment_history_repository::PaymentHistoryRepository;
pub use payment_provider::{
    CheckoutSession, CheckoutSessionSnapshot, CreateCheckoutRequest, CreateCouponRequest,
    CreateCustomerRequest, Customer, InvoiceSnapshot, PaymentError, PaymentErrorCode,
    PaymentEvent, PaymentProvider, ProcessorCoupon, SubscriptionSnapshot, VerifiedEvent,
};
pub use profile_repository::ProfileRepository;
pub use session_validator::SessionValidator;
pub use user_membership_repository::UserMembershipRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome, WebhookResult,
};
