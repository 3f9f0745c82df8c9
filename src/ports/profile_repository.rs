//! ProfileRepository port - the profile subset the engine reads and writes.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::membership::{MemberProfile, MembershipStatus, MembershipType};

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<MemberProfile>, DomainError>;

    /// Store `customer_id` only if the profile has none yet.
    ///
    /// Returns the handle now on the profile, which is the earlier one if a
    /// concurrent request got there first.
    async fn set_billing_customer_if_absent(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<String, DomainError>;

    /// Mark identity verified. Keeps the first verification time.
    async fn mark_identity_verified(&self, user_id: &UserId, at: Timestamp)
        -> Result<(), DomainError>;

    /// Write the denormalized membership projection.
    async fn update_membership_projection(
        &self,
        user_id: &UserId,
        status: MembershipStatus,
        membership_type: MembershipType,
    ) -> Result<(), DomainError>;
}
