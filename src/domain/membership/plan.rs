//! Membership plan value objects.
//!
//! A plan is the pair of membership type and billing cycle the member
//! chose. Both travel through checkout metadata, so their string forms
//! are part of the correlation contract with the payment processor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Membership level purchased by a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipType {
    Basic,
    Premium,
    Vip,
}

impl MembershipType {
    /// Returns the wire/storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipType::Basic => "basic",
            MembershipType::Premium => "premium",
            MembershipType::Vip => "vip",
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(MembershipType::Basic),
            "premium" => Ok(MembershipType::Premium),
            "vip" => Ok(MembershipType::Vip),
            other => Err(ValidationError::invalid_format(
                "membership_type",
                format!("unknown membership type '{}'", other),
            )),
        }
    }
}

/// How often the membership renews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    /// Returns the wire/storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Annual => "annual",
        }
    }

    /// Length of one paid period in days.
    ///
    /// Used only when no processor subscription exists to supply period
    /// boundaries (gift-card-only activations).
    pub fn period_days(&self) -> i64 {
        match self {
            BillingCycle::Monthly => 30,
            BillingCycle::Annual => 365,
        }
    }

    /// Period end for a period starting at `start`.
    pub fn period_end_from(&self, start: Timestamp) -> Timestamp {
        start.add_days(self.period_days())
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingCycle {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(BillingCycle::Monthly),
            "annual" | "yearly" | "year" => Ok(BillingCycle::Annual),
            other => Err(ValidationError::invalid_format(
                "billing_cycle",
                format!("unknown billing cycle '{}'", other),
            )),
        }
    }
}
