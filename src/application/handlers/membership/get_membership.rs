//! GetMembershipHandler - Query handler for the caller's current plan.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::membership::{MembershipError, Resource, UserMembership};
use crate::ports::UserMembershipRepository;

/// Query to get a user's membership.
#[derive(Debug, Clone)]
pub struct GetMembershipQuery {
    pub user_id: UserId,
}

pub struct GetMembershipHandler {
    memberships: Arc<dyn UserMembershipRepository>,
}

impl GetMembershipHandler {
    pub fn new(memberships: Arc<dyn UserMembershipRepository>) -> Self {
        Self { memberships }
    }

    pub async fn handle(&self, query: GetMembershipQuery) -> Result<UserMembership, MembershipError> {
        self.memberships
            .find_by_user(&query.user_id)
            .await?
            .ok_or(MembershipError::NotFound(Resource::Membership))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{user, Fixture};
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::membership::{BillingCycle, MembershipStatus, MembershipType};

    #[tokio::test]
    async fn returns_stored_membership() {
        let fx = Fixture::new();
        let u = user("u1");
        let now = Timestamp::now();
        let membership = UserMembership::new(
            u.clone(),
            Some("sub_1".into()),
            MembershipType::Premium,
            MembershipStatus::Active,
            now,
            BillingCycle::Monthly.period_end_from(now),
        );
        fx.memberships.upsert(&membership).await.unwrap();

        let found = GetMembershipHandler::new(fx.memberships.clone())
            .handle(GetMembershipQuery { user_id: u })
            .await
            .unwrap();

        assert_eq!(found, membership);
    }

    #[tokio::test]
    async fn missing_membership_is_not_found() {
        let fx = Fixture::new();
        let result = GetMembershipHandler::new(fx.memberships.clone())
            .handle(GetMembershipQuery { user_id: user("nobody") })
            .await;
        assert_eq!(result.unwrap_err(), MembershipError::NotFound(Resource::Membership));
    }
}
