//! ExpireStaleIntentsHandler - periodic sweep of abandoned purchases.
//!
//! Initiated intents older than the TTL are expired. Paid intents still
//! waiting on verification are never expired, since money has moved; past
//! the grace period they are reported for follow-up instead. Old webhook
//! ledger rows are pruned in the same pass.

use std::sync::Arc;

use crate::config::LifecycleConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::membership::{IntentStatus, MembershipError};
use crate::ports::{IntentRepository, WebhookEventRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub intent_ttl_hours: i64,
    pub verification_grace_days: i64,
    pub webhook_retention_days: i64,
}

impl From<&LifecycleConfig> for SweepPolicy {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            intent_ttl_hours: i64::from(config.intent_ttl_hours),
            verification_grace_days: i64::from(config.verification_grace_days),
            webhook_retention_days: i64::from(config.webhook_retention_days),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub stale_pending: u64,
    pub pruned_events: u64,
}

pub struct ExpireStaleIntentsHandler {
    intents: Arc<dyn IntentRepository>,
    webhook_events: Arc<dyn WebhookEventRepository>,
    policy: SweepPolicy,
}

impl ExpireStaleIntentsHandler {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        webhook_events: Arc<dyn WebhookEventRepository>,
        policy: SweepPolicy,
    ) -> Self {
        Self {
            intents,
            webhook_events,
            policy,
        }
    }

    pub async fn run(&self, now: Timestamp) -> Result<SweepReport, MembershipError> {
        let mut report = SweepReport::default();

        // 1. Expire abandoned checkouts
        let ttl_cutoff = now.minus_hours(self.policy.intent_ttl_hours);
        for intent in self
            .intents
            .find_initiated_before(IntentStatus::Initiated, ttl_cutoff)
            .await?
        {
            // A payment may land between the read and the write
            if self
                .intents
                .transition(&intent.id, IntentStatus::Initiated, IntentStatus::Expired, now)
                .await?
            {
                report.expired += 1;
            }
        }

        // 2. Report paid intents stuck on verification
        let grace_cutoff = now.add_days(-self.policy.verification_grace_days);
        for intent in self
            .intents
            .find_initiated_before(IntentStatus::PaidPendingVerification, grace_cutoff)
            .await?
        {
            tracing::warn!(
                intent_id = %intent.id,
                user_id = %intent.user_id,
                "Paid intent still waiting on verification"
            );
            report.stale_pending += 1;
        }

        // 3. Prune the webhook ledger
        let retention_cutoff = now.add_days(-self.policy.webhook_retention_days);
        report.pruned_events = self.webhook_events.delete_before(retention_cutoff).await?;

        if report != SweepReport::default() {
            tracing::info!(
                expired = report.expired,
                stale_pending = report.stale_pending,
                pruned_events = report.pruned_events,
                "Lifecycle sweep finished"
            );
        }
        Ok(report)
    }
}
