//! Membership handlers.
//!
//! Command and query handlers for the purchase lifecycle:
//!
//! ## Commands
//! - Creating purchase intents and opening checkout
//! - Processing payment webhooks
//! - Redeeming gift cards
//! - Starting identity verification
//! - Sweeping stale intents
//!
//! ## Queries
//! - Verification status (also drives activation when webhooks are late)
//! - Discount preview
//! - Current membership
//!
//! `PaymentConfirmation` and `ActivationGuard` are shared by the webhook
//! and polling paths.

mod activation_guard;
mod check_verification_status;
mod create_intent;
mod discount_ledger;
mod expire_stale_intents;
mod get_membership;
mod handle_payment_webhook;
mod open_checkout;
mod payment_confirmation;
mod preview_discount;
mod redeem_gift_card;
mod start_identity_verification;

#[cfg(test)]
mod test_support;

// Shared services
pub use activation_guard::ActivationGuard;
pub use discount_ledger::{DiscountLedger, DiscountQuote, ResolvedGiftCard};
pub use payment_confirmation::{ConfirmationOutcome, PaymentConfirmation};

// Commands
pub use create_intent::{CreateIntentCommand, CreateIntentHandler, CreateIntentResult};
pub use expire_stale_intents::{ExpireStaleIntentsHandler, SweepPolicy, SweepReport};
pub use handle_payment_webhook::{HandlePaymentWebhookCommand, HandlePaymentWebhookHandler};
pub use open_checkout::{
    CheckoutSettings, OpenCheckoutCommand, OpenCheckoutHandler, OpenCheckoutResult,
};
pub use redeem_gift_card::{RedeemGiftCardCommand, RedeemGiftCardHandler, RedeemGiftCardResult};
pub use start_identity_verification::{
    StartIdentityVerificationCommand, StartIdentityVerificationHandler,
    StartIdentityVerificationResult,
};

// Queries
pub use check_verification_status::{
    CheckVerificationStatusHandler, CheckVerificationStatusQuery, VerificationStatusResult,
};
pub use get_membership::{GetMembershipHandler, GetMembershipQuery};
pub use preview_discount::{DiscountPreview, PreviewDiscountHandler, PreviewDiscountQuery};
