//! HTTP DTOs (Data Transfer Objects) for membership endpoints.
//!
//! JSON bodies use camelCase. Amounts are integers in minor currency units.

use serde::{Deserialize, Serialize};

use crate::application::{
    CreateIntentResult, DiscountPreview, OpenCheckoutResult, RedeemGiftCardResult,
    StartIdentityVerificationResult, VerificationStatusResult,
};
use crate::domain::foundation::IntentId;
use crate::domain::membership::{
    ActivationOutcome, BillingCycle, CouponKind, GiftCardStatus, IntentStatus, MembershipStatus,
    MembershipType, UserMembership,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a purchase.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub membership_type: MembershipType,
    pub billing_cycle: BillingCycle,
    /// Full price in minor units.
    pub amount: i64,
    #[serde(default)]
    pub coupon: Option<String>,
    #[serde(default)]
    pub gift_card: Option<String>,
}

/// Request to open hosted checkout for an intent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub intent_id: IntentId,
    pub price_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemGiftCardRequest {
    pub code: String,
    #[serde(default)]
    pub amount_to_use: Option<i64>,
    /// Pays for this intent instead of a standalone debit.
    #[serde(default)]
    pub intent_id: Option<IntentId>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySessionRequest {
    #[serde(default)]
    pub intent_id: Option<IntentId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountPreviewRequest {
    pub amount: i64,
    #[serde(default)]
    pub coupon: Option<String>,
    #[serde(default)]
    pub gift_card: Option<String>,
}

/// Query string for `GET /verification-status`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusParams {
    #[serde(default)]
    pub intent_id: Option<IntentId>,
    #[serde(default)]
    pub user_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub intent_id: String,
    pub original_amount: i64,
    pub coupon_discount: i64,
    pub gift_card_applied: i64,
    pub final_amount: i64,
    pub status: IntentStatus,
    /// True when a coupon code was given but did not resolve.
    pub coupon_rejected: bool,
}

impl IntentResponse {
    pub fn from_result(result: &CreateIntentResult, coupon_requested: bool) -> Self {
        let intent = &result.intent;
        Self {
            intent_id: intent.id.to_string(),
            original_amount: intent.original_amount,
            coupon_discount: intent.coupon_discount,
            gift_card_applied: intent.gift_card_applied_amount,
            final_amount: intent.final_amount,
            status: intent.status,
            coupon_rejected: coupon_requested && !result.coupon.is_found(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub redirect_url: String,
}

impl From<OpenCheckoutResult> for CheckoutResponse {
    fn from(result: OpenCheckoutResult) -> Self {
        Self {
            session_id: result.session_id,
            redirect_url: result.redirect_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemGiftCardResponse {
    pub amount_used: i64,
    pub remaining_balance: i64,
    pub status: GiftCardStatus,
    /// Present when the redemption paid for an intent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<ActivationResponse>,
}

impl From<RedeemGiftCardResult> for RedeemGiftCardResponse {
    fn from(result: RedeemGiftCardResult) -> Self {
        Self {
            amount_used: result.debit.amount_used,
            remaining_balance: result.debit.remaining_balance,
            status: result.debit.status,
            membership: result.activation.map(ActivationResponse::from),
        }
    }
}

/// Activation result as shown to the member. A pending outcome is not an
/// error; it carries the reason instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_reason: Option<String>,
}

impl From<ActivationOutcome> for ActivationResponse {
    fn from(outcome: ActivationOutcome) -> Self {
        let pending_reason = match &outcome {
            ActivationOutcome::PreconditionNotMet(failure) => Some(failure.to_string()),
            ActivationOutcome::NotEligible(status) => Some(format!("purchase is {}", status.as_str())),
            ActivationOutcome::Activated | ActivationOutcome::AlreadyActive => None,
        };
        Self {
            active: outcome.is_active(),
            pending_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusResponse {
    pub intent_id: String,
    pub verified: bool,
    pub status: IntentStatus,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_reason: Option<String>,
}

impl From<VerificationStatusResult> for VerificationStatusResponse {
    fn from(result: VerificationStatusResult) -> Self {
        Self {
            intent_id: result.intent_id.to_string(),
            verified: result.verified,
            status: result.status,
            active: result.active,
            pending_reason: result.pending_reason.map(|f| f.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySessionResponse {
    pub session_id: String,
    pub url: Option<String>,
    pub intent_id: String,
}

impl From<StartIdentityVerificationResult> for IdentitySessionResponse {
    fn from(result: StartIdentityVerificationResult) -> Self {
        Self {
            session_id: result.session_id,
            url: result.url,
            intent_id: result.intent_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountPreviewResponse {
    pub original_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_kind: Option<CouponKind>,
    pub coupon_discount: i64,
    pub gift_card_applied: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gift_card_remaining: Option<i64>,
    pub final_amount: i64,
}

impl From<DiscountPreview> for DiscountPreviewResponse {
    fn from(preview: DiscountPreview) -> Self {
        Self {
            original_amount: preview.original_amount,
            coupon_code: preview.coupon_code,
            coupon_kind: preview.coupon_kind,
            coupon_discount: preview.coupon_discount,
            gift_card_applied: preview.gift_card_applied,
            gift_card_remaining: preview.gift_card_remaining,
            final_amount: preview.final_amount,
        }
    }
}

/// The member's current plan. Processor ids are not exposed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub membership_type: MembershipType,
    pub status: MembershipStatus,
    pub has_access: bool,
    /// ISO 8601.
    pub period_start: String,
    /// ISO 8601.
    pub period_end: String,
    pub renews: bool,
}

impl From<UserMembership> for MembershipResponse {
    fn from(membership: UserMembership) -> Self {
        Self {
            membership_type: membership.membership_type,
            status: membership.status,
            has_access: membership.status.grants_access(),
            period_start: membership.period_start.as_datetime().to_rfc3339(),
            period_end: membership.period_end.as_datetime().to_rfc3339(),
            renews: membership.external_subscription_id.is_some(),
        }
    }
}

/// Webhook acknowledgement body.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub outcome: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}
