//! IntentRepository port - persistence for purchase intents.
//!
//! Status changes go through [`IntentRepository::transition`], a
//! compare-and-set on the current status. Two racing writers cannot both
//! win the same transition.
//!
//! New drafts go through [`IntentRepository::replace_initiated`], which
//! keeps at most one `Initiated` intent per user even under concurrent
//! calls.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, IntentId, Timestamp, UserId};
use crate::domain::membership::{IntentStatus, MembershipIntent};

/// Port for intent persistence.
#[async_trait]
pub trait IntentRepository: Send + Sync {
    /// Cancel the user's `Initiated` intents and insert `intent` as one
    /// atomic step.
    ///
    /// Returns the number superseded.
    async fn replace_initiated(&self, intent: &MembershipIntent) -> Result<u64, DomainError>;

    async fn find_by_id(&self, id: &IntentId) -> Result<Option<MembershipIntent>, DomainError>;

    /// Most recent intent for the user in any of `statuses`.
    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
        statuses: &[IntentStatus],
    ) -> Result<Option<MembershipIntent>, DomainError>;

    /// Record the checkout session opened for the intent.
    async fn set_checkout_session(
        &self,
        id: &IntentId,
        checkout_session_id: &str,
    ) -> Result<(), DomainError>;

    /// Compare-and-set status change.
    ///
    /// Writes only if the stored status equals `from`. Moving to
    /// `PaidPendingVerification` stamps `verified_at`; moving to `Active`
    /// stamps `activated_at`. Returns `true` if this call performed the
    /// write.
    async fn transition(
        &self,
        id: &IntentId,
        from: IntentStatus,
        to: IntentStatus,
        at: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Intents in `status` initiated before `cutoff`.
    async fn find_initiated_before(
        &self,
        status: IntentStatus,
        cutoff: Timestamp,
    ) -> Result<Vec<MembershipIntent>, DomainError>;
}
