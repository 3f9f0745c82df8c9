//! Member profile subset read and written by the engine.

use super::{MembershipStatus, MembershipType};
use crate::domain::foundation::{Timestamp, UserId};

/// Postal address used for fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PostalAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl PostalAddress {
    /// Returns true if every required line is filled in.
    pub fn is_complete(&self) -> bool {
        [&self.line1, &self.city, &self.postal_code, &self.country]
            .iter()
            .all(|s| !s.trim().is_empty())
    }
}

/// Profile fields the engine depends on.
///
/// `membership_status` and `membership_type` are a projection written only
/// by the engine for fast reads elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub legal_name: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<PostalAddress>,
    pub identity_verified: bool,
    pub identity_verified_at: Option<Timestamp>,
    pub membership_status: Option<MembershipStatus>,
    pub membership_type: Option<MembershipType>,
    /// Processor customer handle, created once and reused.
    pub billing_customer_id: Option<String>,
}

impl MemberProfile {
    /// Creates an empty profile for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            legal_name: None,
            contact_phone: None,
            address: None,
            identity_verified: false,
            identity_verified_at: None,
            membership_status: None,
            membership_type: None,
            billing_customer_id: None,
        }
    }

    /// Names of required fulfillment fields that are missing.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !has_text(&self.legal_name) {
            missing.push("legal_name");
        }
        if !has_text(&self.contact_phone) {
            missing.push("contact_phone");
        }
        if !self.address.as_ref().is_some_and(PostalAddress::is_complete) {
            missing.push("address");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
pub(crate) fn complete_profile(user_id: UserId) -> MemberProfile {
    MemberProfile {
        legal_name: Some("Ada Lovelace".into()),
        contact_phone: Some("+44 20 7946 0000".into()),
        address: Some(PostalAddress {
            line1: "12 Analytical Row".into(),
            line2: None,
            city: "London".into(),
            postal_code: "N1 9GU".into(),
            country: "GB".into(),
        }),
        ..MemberProfile::new(user_id)
    }
}
