//! Membership domain module.
//!
//! Purchase intents, the current-plan record, discount arithmetic, gift
//! card balances, and the activation preconditions.
//!
//! # Module Structure
//!
//! - `intent` - MembershipIntent and its status state machine
//! - `user_membership` - UserMembership and MembershipStatus
//! - `discount` - Coupon resolution and price breakdown
//! - `gift_card` - Gift card balance rules and debit ledger types
//! - `activation` - Activation preconditions and outcomes
//! - `correlation` - Metadata linking processor objects to intents

mod activation;
mod correlation;
mod discount;
mod errors;
mod gift_card;
mod intent;
mod payment_record;
mod plan;
mod profile;
mod user_membership;
mod webhook_errors;

pub use activation::{ActivationOutcome, ActivationPreconditions, PreconditionFailure};
pub use correlation::{
    CorrelationError, CorrelationMetadata, BILLING_CYCLE_KEY, INTENT_ID_KEY, MEMBERSHIP_TYPE_KEY,
    USER_ID_KEY,
};
pub use discount::{
    validate_amount, Coupon, CouponKind, CouponResolution, DiscountBreakdown, MAX_AMOUNT,
};
pub use errors::{MembershipError, Resource};
pub use gift_card::{
    DebitAmount, GiftCard, GiftCardCode, GiftCardDebit, GiftCardError, GiftCardStatus,
    GiftCardTransaction,
};
pub use intent::{IntentStatus, MembershipIntent};
pub use payment_record::{BillingReason, PaymentRecord};
pub use plan::{BillingCycle, MembershipType};
pub use profile::{MemberProfile, PostalAddress};
pub use user_membership::{MembershipStatus, UserMembership};
pub use webhook_errors::WebhookError;

#[cfg(test)]
pub(crate) use profile::complete_profile;
