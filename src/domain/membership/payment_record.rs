//! Payment history entries. Keyed by processor invoice id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{IntentId, Timestamp, UserId};

/// Why the processor raised an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingReason {
    /// First invoice of a new subscription.
    SubscriptionCreate,
    /// Renewal.
    SubscriptionCycle,
    SubscriptionUpdate,
    Manual,
    /// Recorded from a checkout session with no invoice.
    CheckoutSession,
    Other(String),
}

impl BillingReason {
    pub fn parse(s: &str) -> Self {
        match s {
            "subscription_create" => BillingReason::SubscriptionCreate,
            "subscription_cycle" => BillingReason::SubscriptionCycle,
            "subscription_update" => BillingReason::SubscriptionUpdate,
            "manual" => BillingReason::Manual,
            "checkout_session" => BillingReason::CheckoutSession,
            other => BillingReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BillingReason::SubscriptionCreate => "subscription_create",
            BillingReason::SubscriptionCycle => "subscription_cycle",
            BillingReason::SubscriptionUpdate => "subscription_update",
            BillingReason::Manual => "manual",
            BillingReason::CheckoutSession => "checkout_session",
            BillingReason::Other(s) => s,
        }
    }

    /// Returns true for the invoice that opens a subscription.
    pub fn is_initial(&self) -> bool {
        matches!(self, BillingReason::SubscriptionCreate)
    }
}

impl fmt::Display for BillingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful payment. Upsert key is `invoice_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub invoice_id: String,
    pub user_id: UserId,
    pub intent_id: Option<IntentId>,
    pub subscription_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub billing_reason: BillingReason,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub paid_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_reason_parses_known_values() {
        assert_eq!(
            BillingReason::parse("subscription_create"),
            BillingReason::SubscriptionCreate
        );
        assert!(BillingReason::parse("subscription_create").is_initial());
        assert!(!BillingReason::parse("subscription_cycle").is_initial());
    }

    #[test]
    fn unknown_billing_reason_is_preserved() {
        let reason = BillingReason::parse("upcoming");
        assert_eq!(reason, BillingReason::Other("upcoming".into()));
        assert_eq!(reason.as_str(), "upcoming");
    }
}
