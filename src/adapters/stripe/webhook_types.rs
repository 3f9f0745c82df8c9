//! Stripe wire types.
//!
//! Only the fields the engine reads are declared; everything else in
//! Stripe's payloads is ignored. Each object converts into the provider-
//! neutral snapshot defined by the payment port.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::membership::BillingReason;
use crate::ports::{
    CheckoutSessionSnapshot, InvoiceSnapshot, SubscriptionSnapshot, VerificationSession,
    VerificationStatus,
};

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureParseError {
    #[error("Missing Stripe-Signature header")]
    MissingHeader,
    #[error("Missing timestamp (t=) in signature")]
    MissingTimestamp,
    #[error("Missing v1 signature in header")]
    MissingV1Signature,
    #[error("Invalid timestamp format")]
    InvalidTimestamp,
    #[error("Invalid signature format (not valid hex)")]
    InvalidSignatureFormat,
}

/// Parsed Stripe-Signature header.
///
/// Format: `t=timestamp,v1=signature[,v1=signature...]`. Stripe sends one
/// `v1` per active signing secret during secret rotation.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the event.
    pub timestamp: i64,
    /// HMAC-SHA256 signatures, hex-decoded.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => v1_signatures.push(
                    hex_decode(value.trim()).ok_or(SignatureParseError::InvalidSignatureFormat)?,
                ),
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }
        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
        .collect()
}

/// Encode bytes to a lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    pub data: StripeEventData,
    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Objects
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub invoice: Option<String>,
    pub payment_status: String,
    pub mode: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    /// Hosted checkout page.
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl From<StripeCheckoutSession> for CheckoutSessionSnapshot {
    fn from(s: StripeCheckoutSession) -> Self {
        Self {
            id: s.id,
            mode: s.mode,
            payment_status: s.payment_status,
            customer_id: s.customer,
            subscription_id: s.subscription,
            invoice_id: s.invoice,
            amount_total: s.amount_total,
            currency: s.currency,
            metadata: s.metadata,
        }
    }
}

/// Stripe Customer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

/// Stripe Subscription.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl From<StripeSubscription> for SubscriptionSnapshot {
    fn from(s: StripeSubscription) -> Self {
        Self {
            id: s.id,
            customer_id: s.customer,
            status: s.status,
            current_period_start: s.current_period_start,
            current_period_end: s.current_period_end,
            metadata: s.metadata,
        }
    }
}

/// Stripe Invoice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    pub id: String,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    pub currency: String,
    pub billing_reason: Option<String>,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    #[serde(default)]
    pub paid: bool,
}

impl StripeInvoice {
    pub fn billing_reason(&self) -> BillingReason {
        self.billing_reason
            .as_deref()
            .map(BillingReason::parse)
            .unwrap_or(BillingReason::Manual)
    }
}

impl From<StripeInvoice> for InvoiceSnapshot {
    fn from(i: StripeInvoice) -> Self {
        let billing_reason = i.billing_reason();
        Self {
            id: i.id,
            subscription_id: i.subscription,
            amount_paid: i.amount_paid,
            currency: i.currency,
            billing_reason,
            period_start: i.period_start,
            period_end: i.period_end,
            paid: i.paid,
        }
    }
}

/// Stripe Coupon.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCoupon {
    pub id: String,
}

/// Stripe Identity VerificationSession.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeVerificationSession {
    pub id: String,
    pub status: String,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl From<StripeVerificationSession> for VerificationSession {
    fn from(s: StripeVerificationSession) -> Self {
        Self {
            id: s.id,
            status: VerificationStatus::parse(&s.status),
            url: s.url,
            metadata: s.metadata,
        }
    }
}

/// Stripe list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_with_multiple_v1() {
        let header = SignatureHeader::parse("t=1700000000,v1=abcd,v1=ef01,v0=9999").unwrap();
        assert_eq!(header.timestamp, 1_700_000_000);
        assert_eq!(header.v1_signatures.len(), 2);
        assert_eq!(header.v1_signatures[0], vec![0xab, 0xcd]);
    }

    #[test]
    fn header_without_timestamp_is_rejected() {
        assert_eq!(
            SignatureHeader::parse("v1=abcd").unwrap_err(),
            SignatureParseError::MissingTimestamp
        );
    }

    #[test]
    fn header_without_v1_is_rejected() {
        assert_eq!(
            SignatureHeader::parse("t=1").unwrap_err(),
            SignatureParseError::MissingV1Signature
        );
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert_eq!(
            SignatureHeader::parse("t=1,v1=zz").unwrap_err(),
            SignatureParseError::InvalidSignatureFormat
        );
    }

    #[test]
    fn empty_header_is_missing() {
        assert_eq!(
            SignatureHeader::parse("").unwrap_err(),
            SignatureParseError::MissingHeader
        );
    }

    #[test]
    fn hex_round_trip() {
        let bytes = vec![0u8, 15, 255];
        assert_eq!(hex_decode(&hex_encode(&bytes)), Some(bytes));
    }

    #[test]
    fn invoice_without_billing_reason_is_manual() {
        let invoice: StripeInvoice = serde_json::from_value(serde_json::json!({
            "id": "in_1",
            "currency": "usd",
        }))
        .unwrap();
        assert_eq!(invoice.billing_reason(), BillingReason::Manual);
    }

    #[test]
    fn checkout_session_converts_to_snapshot() {
        let session: StripeCheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "customer": "cus_1",
            "subscription": "sub_1",
            "invoice": "in_1",
            "payment_status": "paid",
            "mode": "subscription",
            "metadata": {"user_id": "u1"}
        }))
        .unwrap();
        let snapshot: CheckoutSessionSnapshot = session.into();
        assert!(snapshot.is_paid());
        assert_eq!(snapshot.invoice_id.as_deref(), Some("in_1"));
        assert_eq!(snapshot.metadata.get("user_id").map(String::as_str), Some("u1"));
    }
}
