//! In-memory intent repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, IntentId, Timestamp, UserId};
use crate::domain::membership::{IntentStatus, MembershipIntent};
use crate::ports::IntentRepository;

/// In-memory implementation of the IntentRepository port.
///
/// The write lock makes `transition` a true compare-and-set.
#[derive(Default)]
pub struct InMemoryIntentRepository {
    intents: RwLock<HashMap<IntentId, MembershipIntent>>,
}

impl InMemoryIntentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored intent.
    pub async fn all(&self) -> Vec<MembershipIntent> {
        self.intents.read().await.values().cloned().collect()
    }

    /// Overwrite an intent as-is, bypassing status checks. For seeding.
    pub async fn put(&self, intent: MembershipIntent) {
        self.intents.write().await.insert(intent.id, intent);
    }
}

#[async_trait]
impl IntentRepository for InMemoryIntentRepository {
    async fn replace_initiated(&self, intent: &MembershipIntent) -> Result<u64, DomainError> {
        let mut intents = self.intents.write().await;
        if intents.contains_key(&intent.id) {
            return Err(DomainError::database("intent already exists")
                .with_detail("intent_id", intent.id.to_string()));
        }

        let mut superseded = 0;
        for existing in intents.values_mut() {
            if existing.user_id == intent.user_id && existing.status == IntentStatus::Initiated {
                existing.status = IntentStatus::Cancelled;
                superseded += 1;
            }
        }
        intents.insert(intent.id, intent.clone());
        Ok(superseded)
    }

    async fn find_by_id(&self, id: &IntentId) -> Result<Option<MembershipIntent>, DomainError> {
        Ok(self.intents.read().await.get(id).cloned())
    }

    async fn find_latest_for_user(
        &self,
        user_id: &UserId,
        statuses: &[IntentStatus],
    ) -> Result<Option<MembershipIntent>, DomainError> {
        Ok(self
            .intents
            .read()
            .await
            .values()
            .filter(|i| &i.user_id == user_id && statuses.contains(&i.status))
            .max_by_key(|i| i.initiated_at)
            .cloned())
    }

    async fn set_checkout_session(
        &self,
        id: &IntentId,
        checkout_session_id: &str,
    ) -> Result<(), DomainError> {
        match self.intents.write().await.get_mut(id) {
            Some(intent) => {
                intent.checkout_session_id = Some(checkout_session_id.to_string());
                Ok(())
            }
            None => Err(DomainError::new(ErrorCode::IntentNotFound, "intent not found")),
        }
    }

    async fn transition(
        &self,
        id: &IntentId,
        from: IntentStatus,
        to: IntentStatus,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut intents = self.intents.write().await;
        let Some(intent) = intents.get_mut(id) else {
            return Ok(false);
        };
        if intent.status != from {
            return Ok(false);
        }
        intent.status = to;
        match to {
            IntentStatus::PaidPendingVerification => intent.verified_at = Some(at),
            IntentStatus::Active => intent.activated_at = Some(at),
            _ => {}
        }
        Ok(true)
    }

    async fn find_initiated_before(
        &self,
        status: IntentStatus,
        cutoff: Timestamp,
    ) -> Result<Vec<MembershipIntent>, DomainError> {
        Ok(self
            .intents
            .read()
            .await
            .values()
            .filter(|i| i.status == status && i.initiated_at.is_before(&cutoff))
            .cloned()
            .collect())
    }
}
