//! Stripe webhook signature verification and event parsing.
//!
//! # Security
//!
//! - HMAC-SHA256 over `"{timestamp}.{payload}"` with constant-time compare
//! - Signed timestamp must be at most 5 minutes old and at most 60 seconds
//!   in the future
//! - Any failure rejects the whole event

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ports::{PaymentError, PaymentEvent, VerifiedEvent};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCheckoutSession, StripeInvoice, StripeSubscription,
    StripeVerificationSession, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
pub const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
pub const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::invalid_webhook(format!("Invalid signing key: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Builds a `Stripe-Signature` header value for `payload`.
///
/// Used by the in-process fake provider and by tests.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signature = compute_signature(secret, timestamp, payload).unwrap_or_default();
    format!("t={},v1={}", timestamp, hex_encode(&signature))
}

/// Verifies the signature header against the raw payload.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let header = SignatureHeader::parse(signature_header).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
        PaymentError::invalid_webhook(e.to_string())
    })?;

    let age = now - header.timestamp;
    if age > MAX_TIMESTAMP_AGE_SECS {
        tracing::warn!(
            event_timestamp = header.timestamp,
            current_time = now,
            age_secs = age,
            "Webhook event too old - possible replay"
        );
        return Err(PaymentError::invalid_webhook(format!(
            "Event too old ({} seconds)",
            age
        )));
    }
    if age < -MAX_FUTURE_TOLERANCE_SECS {
        tracing::warn!(
            event_timestamp = header.timestamp,
            current_time = now,
            "Webhook event from the future"
        );
        return Err(PaymentError::invalid_webhook("Event timestamp in future"));
    }

    let expected = compute_signature(secret, header.timestamp, payload)?;
    let matched = header
        .v1_signatures
        .iter()
        .any(|provided| bool::from(expected.as_slice().ct_eq(provided.as_slice())));

    if !matched {
        tracing::warn!("Invalid webhook signature");
        return Err(PaymentError::invalid_webhook("Invalid signature"));
    }
    Ok(())
}

/// Parses a verified payload into a [`VerifiedEvent`].
///
/// Unknown event types parse to [`PaymentEvent::Unknown`]. A known type
/// whose object does not parse is an error.
pub fn parse_event(payload: &[u8], require_livemode: bool) -> Result<VerifiedEvent, PaymentError> {
    let raw: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse webhook payload");
        PaymentError::invalid_webhook(format!("Invalid JSON: {}", e))
    })?;
    let event: StripeWebhookEvent = serde_json::from_value(raw.clone())
        .map_err(|e| PaymentError::invalid_webhook(format!("Invalid event envelope: {}", e)))?;

    if require_livemode && !event.livemode {
        tracing::warn!(event_id = %event.id, "Rejected test mode event");
        return Err(PaymentError::invalid_webhook(
            "Test mode events not allowed in production",
        ));
    }

    let payload = match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: StripeCheckoutSession = object(&event, "checkout session")?;
            PaymentEvent::CheckoutCompleted {
                session: session.into(),
            }
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            let invoice: StripeInvoice = object(&event, "invoice")?;
            PaymentEvent::InvoicePaid {
                billing_reason: invoice.billing_reason(),
                invoice_id: invoice.id,
                subscription_id: invoice.subscription,
            }
        }
        "customer.subscription.deleted" => {
            let sub: StripeSubscription = object(&event, "subscription")?;
            PaymentEvent::SubscriptionDeleted {
                subscription_id: sub.id,
                metadata: sub.metadata,
            }
        }
        "identity.verification_session.verified" => {
            let session: StripeVerificationSession = object(&event, "verification session")?;
            PaymentEvent::IdentityVerified {
                verification_session_id: session.id,
                metadata: session.metadata,
            }
        }
        _ => PaymentEvent::Unknown,
    };

    Ok(VerifiedEvent {
        id: event.id,
        event_type: event.event_type,
        created: event.created,
        livemode: event.livemode,
        payload,
        raw,
    })
}

fn object<T: serde::de::DeserializeOwned>(
    event: &StripeWebhookEvent,
    what: &str,
) -> Result<T, PaymentError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| PaymentError::invalid_webhook(format!("Invalid {}: {}", what, e)))
}

/// Verifies then parses.
pub fn verify_and_parse(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    require_livemode: bool,
) -> Result<VerifiedEvent, PaymentError> {
    verify_signature(
        secret,
        payload,
        signature_header,
        chrono::Utc::now().timestamp(),
    )?;
    let event = parse_event(payload, require_livemode)?;
    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Webhook signature verified"
    );
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::BillingReason;

    const SECRET: &str = "whsec_test_secret";

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn valid_signature_passes() {
        let payload = br#"{"id":"evt_test"}"#;
        let ts = now();
        let header = sign_payload(SECRET, ts, payload);
        assert!(verify_signature(SECRET, payload, &header, ts).is_ok());
    }

    #[test]
    fn wrong_secret_fails() {
        let payload = br#"{"id":"evt_test"}"#;
        let ts = now();
        let header = sign_payload("whsec_other", ts, payload);
        assert!(verify_signature(SECRET, payload, &header, ts).is_err());
    }

    #[test]
    fn tampered_payload_fails() {
        let ts = now();
        let header = sign_payload(SECRET, ts, br#"{"amount":1}"#);
        assert!(verify_signature(SECRET, br#"{"amount":2}"#, &header, ts).is_err());
    }

    #[test]
    fn expired_timestamp_fails() {
        let payload = b"{}";
        let ts = now() - MAX_TIMESTAMP_AGE_SECS - 1;
        let header = sign_payload(SECRET, ts, payload);
        let err = verify_signature(SECRET, payload, &header, now()).unwrap_err();
        assert!(err.message.contains("too old"));
    }

    #[test]
    fn future_timestamp_beyond_skew_fails() {
        let payload = b"{}";
        let ts = now() + MAX_FUTURE_TOLERANCE_SECS + 30;
        let header = sign_payload(SECRET, ts, payload);
        assert!(verify_signature(SECRET, payload, &header, now()).is_err());
    }

    #[test]
    fn small_future_skew_is_tolerated() {
        let payload = b"{}";
        let ts = now() + 30;
        let header = sign_payload(SECRET, ts, payload);
        assert!(verify_signature(SECRET, payload, &header, now()).is_ok());
    }

    #[test]
    fn rotated_secret_second_signature_matches() {
        let payload = b"{}";
        let ts = now();
        let good = sign_payload(SECRET, ts, payload);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", ts, "00".repeat(32), good_sig);
        assert!(verify_signature(SECRET, payload, &header, ts).is_ok());
    }

    #[test]
    fn parses_checkout_completed() {
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "livemode": false,
            "data": {"object": {
                "id": "cs_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "invoice": "in_1",
                "payment_status": "paid",
                "mode": "subscription",
                "metadata": {"user_id": "u1", "intent_id": "x"}
            }}
        });
        let event = parse_event(payload.to_string().as_bytes(), false).unwrap();
        assert_eq!(event.id, "evt_1");
        match event.payload {
            PaymentEvent::CheckoutCompleted { session } => {
                assert_eq!(session.subscription_id.as_deref(), Some("sub_1"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn parses_invoice_payment_succeeded_as_invoice_paid() {
        let payload = serde_json::json!({
            "id": "evt_2",
            "type": "invoice.payment_succeeded",
            "created": 1,
            "data": {"object": {
                "id": "in_9",
                "subscription": "sub_1",
                "currency": "usd",
                "billing_reason": "subscription_cycle"
            }}
        });
        let event = parse_event(payload.to_string().as_bytes(), false).unwrap();
        assert_eq!(
            event.payload,
            PaymentEvent::InvoicePaid {
                invoice_id: "in_9".into(),
                subscription_id: Some("sub_1".into()),
                billing_reason: BillingReason::SubscriptionCycle,
            }
        );
    }

    #[test]
    fn unknown_type_is_forward_compatible() {
        let payload = serde_json::json!({
            "id": "evt_3",
            "type": "customer.tax_id.created",
            "created": 1,
            "data": {"object": {"anything": true}}
        });
        let event = parse_event(payload.to_string().as_bytes(), false).unwrap();
        assert_eq!(event.payload, PaymentEvent::Unknown);
    }

    #[test]
    fn test_mode_rejected_when_livemode_required() {
        let payload = serde_json::json!({
            "id": "evt_4",
            "type": "invoice.paid",
            "created": 1,
            "livemode": false,
            "data": {"object": {}}
        });
        assert!(parse_event(payload.to_string().as_bytes(), true).is_err());
    }

    #[test]
    fn malformed_known_object_is_rejected() {
        let payload = serde_json::json!({
            "id": "evt_5",
            "type": "customer.subscription.deleted",
            "created": 1,
            "data": {"object": {"id": 42}}
        });
        assert!(parse_event(payload.to_string().as_bytes(), false).is_err());
    }

    #[test]
    fn verify_and_parse_rejects_garbage_json() {
        let payload = b"not json";
        let header = sign_payload(SECRET, now(), payload);
        assert!(verify_and_parse(SECRET, payload, &header, false).is_err());
    }
}
