//! Activation preconditions.
//!
//! Checked in a fixed order, stopping at the first failure: profile
//! completeness, identity verification, payment evidence.

use std::fmt;

use super::{IntentStatus, MemberProfile};

/// Why an intent cannot be activated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    ProfileIncomplete { missing: Vec<&'static str> },
    IdentityNotVerified,
    PaymentMissing,
}

impl PreconditionFailure {
    /// Stable short code for responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            PreconditionFailure::ProfileIncomplete { .. } => "profile_incomplete",
            PreconditionFailure::IdentityNotVerified => "identity_not_verified",
            PreconditionFailure::PaymentMissing => "payment_missing",
        }
    }
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionFailure::ProfileIncomplete { missing } => {
                write!(f, "profile incomplete: {}", missing.join(", "))
            }
            PreconditionFailure::IdentityNotVerified => f.write_str("identity not verified"),
            PreconditionFailure::PaymentMissing => f.write_str("no payment recorded"),
        }
    }
}

/// Inputs to the activation check.
#[derive(Debug, Clone, Copy)]
pub struct ActivationPreconditions<'a> {
    pub profile: &'a MemberProfile,
    /// A successful payment, or a gift card redemption covering the
    /// intent, exists.
    pub has_payment_evidence: bool,
}

impl<'a> ActivationPreconditions<'a> {
    pub fn check(&self) -> Result<(), PreconditionFailure> {
        let missing = self.profile.missing_fields();
        if !missing.is_empty() {
            return Err(PreconditionFailure::ProfileIncomplete { missing });
        }
        if !self.profile.identity_verified {
            return Err(PreconditionFailure::IdentityNotVerified);
        }
        if !self.has_payment_evidence {
            return Err(PreconditionFailure::PaymentMissing);
        }
        Ok(())
    }
}

/// Result of running the activation guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// This call performed the activation.
    Activated,
    /// Already active; nothing written.
    AlreadyActive,
    /// Remains pending until a later signal.
    PreconditionNotMet(PreconditionFailure),
    /// The intent is in a status the guard does not act on.
    NotEligible(IntentStatus),
}

impl ActivationOutcome {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ActivationOutcome::Activated | ActivationOutcome::AlreadyActive
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::membership::profile::complete_profile;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn incomplete_profile_is_checked_first() {
        let profile = MemberProfile::new(user());
        let result = ActivationPreconditions {
            profile: &profile,
            has_payment_evidence: false,
        }
        .check();
        assert!(matches!(
            result,
            Err(PreconditionFailure::ProfileIncomplete { .. })
        ));
    }

    #[test]
    fn unverified_identity_blocks_paid_member() {
        let profile = complete_profile(user());
        let result = ActivationPreconditions {
            profile: &profile,
            has_payment_evidence: true,
        }
        .check();
        assert_eq!(result, Err(PreconditionFailure::IdentityNotVerified));
    }

    #[test]
    fn missing_payment_is_last() {
        let mut profile = complete_profile(user());
        profile.identity_verified = true;
        let result = ActivationPreconditions {
            profile: &profile,
            has_payment_evidence: false,
        }
        .check();
        assert_eq!(result, Err(PreconditionFailure::PaymentMissing));
    }

    #[test]
    fn all_met_passes() {
        let mut profile = complete_profile(user());
        profile.identity_verified = true;
        assert!(ActivationPreconditions {
            profile: &profile,
            has_payment_evidence: true,
        }
        .check()
        .is_ok());
    }

    #[test]
    fn failure_codes_are_stable() {
        assert_eq!(PreconditionFailure::PaymentMissing.code(), "payment_missing");
        assert_eq!(
            PreconditionFailure::ProfileIncomplete { missing: vec!["address"] }.to_string(),
            "profile incomplete: address"
        );
    }
}
