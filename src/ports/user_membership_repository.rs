//! UserMembershipRepository port.
//!
//! One row per user. `upsert` conflicts on `user_id`; the external
//! subscription id is unique among rows that have one.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::membership::UserMembership;

#[async_trait]
pub trait UserMembershipRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError>;

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<UserMembership>, DomainError>;

    /// Insert or overwrite the user's membership.
    async fn upsert(&self, membership: &UserMembership) -> Result<(), DomainError>;
}
