//! In-memory user membership repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::membership::UserMembership;
use crate::ports::UserMembershipRepository;

/// In-memory implementation keyed by user id.
///
/// Counts upserts so tests can assert how many times activation wrote.
#[derive(Default)]
pub struct InMemoryUserMembershipRepository {
    memberships: RwLock<HashMap<UserId, UserMembership>>,
    upserts: AtomicUsize,
}

impl InMemoryUserMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upsert calls so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.memberships.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memberships.read().await.is_empty()
    }
}

#[async_trait]
impl UserMembershipRepository for InMemoryUserMembershipRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError> {
        Ok(self.memberships.read().await.get(user_id).cloned())
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<UserMembership>, DomainError> {
        Ok(self
            .memberships
            .read()
            .await
            .values()
            .find(|m| m.external_subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn upsert(&self, membership: &UserMembership) -> Result<(), DomainError> {
        let mut memberships = self.memberships.write().await;
        if let Some(sub_id) = membership.external_subscription_id.as_deref() {
            let taken = memberships.values().any(|m| {
                m.user_id != membership.user_id
                    && m.external_subscription_id.as_deref() == Some(sub_id)
            });
            if taken {
                return Err(DomainError::database("subscription already linked to another user")
                    .with_detail("constraint", "user_memberships_subscription_key"));
            }
        }
        memberships.insert(membership.user_id.clone(), membership.clone());
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
