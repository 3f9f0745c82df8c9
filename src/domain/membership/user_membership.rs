//! The authoritative current-plan record, one per user.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::MembershipType;
use crate::domain::foundation::{StateMachine, Timestamp, UserId, ValidationError};

/// Membership status.
///
/// Mirrors the processor's subscription status, plus `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Paused,
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Trialing => "trialing",
            MembershipStatus::PastDue => "past_due",
            MembershipStatus::Unpaid => "unpaid",
            MembershipStatus::Incomplete => "incomplete",
            MembershipStatus::IncompleteExpired => "incomplete_expired",
            MembershipStatus::Paused => "paused",
            MembershipStatus::Cancelled => "cancelled",
        }
    }

    /// Maps a processor subscription status string.
    ///
    /// The processor spells cancellation `canceled`; both spellings map to
    /// `Cancelled`.
    pub fn from_provider(status: &str) -> Result<Self, ValidationError> {
        match status {
            "canceled" => Ok(MembershipStatus::Cancelled),
            other => other.parse(),
        }
    }

    /// Returns true if this status grants member access.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            MembershipStatus::Active | MembershipStatus::Trialing | MembershipStatus::PastDue
        )
    }
}

impl FromStr for MembershipStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "trialing" => Ok(MembershipStatus::Trialing),
            "past_due" => Ok(MembershipStatus::PastDue),
            "unpaid" => Ok(MembershipStatus::Unpaid),
            "incomplete" => Ok(MembershipStatus::Incomplete),
            "incomplete_expired" => Ok(MembershipStatus::IncompleteExpired),
            "paused" => Ok(MembershipStatus::Paused),
            "cancelled" => Ok(MembershipStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "membership_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for MembershipStatus {
    fn valid_transitions(&self) -> &'static [Self] {
        use MembershipStatus::*;
        match self {
            // A cancelled membership only comes back through a new activation.
            Cancelled => &[Active, Trialing],
            _ => &[
                Active,
                Trialing,
                PastDue,
                Unpaid,
                Incomplete,
                IncompleteExpired,
                Paused,
                Cancelled,
            ],
        }
    }
}

/// Current plan for a user. Upsert key is `user_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMembership {
    pub user_id: UserId,
    /// Processor subscription id. `None` for gift-card-only memberships.
    pub external_subscription_id: Option<String>,
    pub membership_type: MembershipType,
    pub status: MembershipStatus,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub updated_at: Timestamp,
}

impl UserMembership {
    pub fn new(
        user_id: UserId,
        external_subscription_id: Option<String>,
        membership_type: MembershipType,
        status: MembershipStatus,
        period_start: Timestamp,
        period_end: Timestamp,
    ) -> Self {
        Self {
            user_id,
            external_subscription_id,
            membership_type,
            status,
            period_start,
            period_end,
            updated_at: Timestamp::now(),
        }
    }

    /// Applies a fresh subscription snapshot: status and period.
    ///
    /// Illegal status moves are rejected; the record is unchanged on error.
    pub fn apply_snapshot(
        &mut self,
        status: MembershipStatus,
        period_start: Timestamp,
        period_end: Timestamp,
    ) -> Result<(), ValidationError> {
        if status != self.status {
            self.status.transition_to(status)?;
        }
        self.status = status;
        self.period_start = period_start;
        self.period_end = period_end;
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Marks the membership cancelled.
    pub fn cancel(&mut self) {
        self.status = MembershipStatus::Cancelled;
        self.updated_at = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(status: MembershipStatus) -> UserMembership {
        let start = Timestamp::from_unix_secs(1_700_000_000);
        UserMembership::new(
            UserId::new("user-1").unwrap(),
            Some("sub_123".into()),
            MembershipType::Basic,
            status,
            start,
            start.add_days(30),
        )
    }

    #[test]
    fn provider_canceled_maps_to_cancelled() {
        assert_eq!(
            MembershipStatus::from_provider("canceled"),
            Ok(MembershipStatus::Cancelled)
        );
        assert_eq!(
            MembershipStatus::from_provider("past_due"),
            Ok(MembershipStatus::PastDue)
        );
        assert!(MembershipStatus::from_provider("weird").is_err());
    }

    #[test]
    fn snapshot_updates_period_and_status() {
        let mut m = membership(MembershipStatus::Active);
        let start = Timestamp::from_unix_secs(1_800_000_000);
        m.apply_snapshot(MembershipStatus::PastDue, start, start.add_days(30))
            .unwrap();
        assert_eq!(m.status, MembershipStatus::PastDue);
        assert_eq!(m.period_start, start);
    }

    #[test]
    fn cancelled_does_not_drift_to_past_due() {
        let mut m = membership(MembershipStatus::Cancelled);
        let start = Timestamp::now();
        assert!(m
            .apply_snapshot(MembershipStatus::PastDue, start, start.add_days(30))
            .is_err());
        assert_eq!(m.status, MembershipStatus::Cancelled);
    }

    #[test]
    fn cancelled_can_be_reactivated() {
        assert!(MembershipStatus::Cancelled.can_transition_to(&MembershipStatus::Active));
    }

    #[test]
    fn access_statuses() {
        assert!(MembershipStatus::Active.grants_access());
        assert!(MembershipStatus::PastDue.grants_access());
        assert!(!MembershipStatus::Cancelled.grants_access());
        assert!(!MembershipStatus::Unpaid.grants_access());
    }
}
