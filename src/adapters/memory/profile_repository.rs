//! In-memory profile repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::membership::{MemberProfile, MembershipStatus, MembershipType};
use crate::ports::ProfileRepository;

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<UserId, MemberProfile>>,
    projection_writes: AtomicUsize,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    pub async fn put(&self, profile: MemberProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    /// Number of membership projection writes so far.
    pub fn projection_write_count(&self) -> usize {
        self.projection_writes.load(Ordering::SeqCst)
    }
}

fn profile_not_found(user_id: &UserId) -> DomainError {
    DomainError::new(ErrorCode::ProfileNotFound, "profile not found")
        .with_detail("user_id", user_id.as_str())
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<MemberProfile>, DomainError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn set_billing_customer_if_absent(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<String, DomainError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| profile_not_found(user_id))?;
        Ok(profile
            .billing_customer_id
            .get_or_insert_with(|| customer_id.to_string())
            .clone())
    }

    async fn mark_identity_verified(
        &self,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| profile_not_found(user_id))?;
        profile.identity_verified = true;
        profile.identity_verified_at.get_or_insert(at);
        Ok(())
    }

    async fn update_membership_projection(
        &self,
        user_id: &UserId,
        status: MembershipStatus,
        membership_type: MembershipType,
    ) -> Result<(), DomainError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| profile_not_found(user_id))?;
        profile.membership_status = Some(status);
        profile.membership_type = Some(membership_type);
        self.projection_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
