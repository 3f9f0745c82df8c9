//! Background lifecycle policy: stale-intent expiry and ledger retention

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// `initiated` intents older than this are expired
    #[serde(default = "default_intent_ttl_hours")]
    pub intent_ttl_hours: u32,

    /// Paid-but-unverified intents older than this are reported
    #[serde(default = "default_verification_grace_days")]
    pub verification_grace_days: u32,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_webhook_retention_days")]
    pub webhook_retention_days: u32,
}

impl LifecycleConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.intent_ttl_hours == 0 {
            return Err(ValidationError::MustBePositive("lifecycle.intent_ttl_hours"));
        }
        if self.verification_grace_days == 0 {
            return Err(ValidationError::MustBePositive(
                "lifecycle.verification_grace_days",
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::MustBePositive("lifecycle.sweep_interval_secs"));
        }
        if self.webhook_retention_days == 0 {
            return Err(ValidationError::MustBePositive(
                "lifecycle.webhook_retention_days",
            ));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            intent_ttl_hours: default_intent_ttl_hours(),
            verification_grace_days: default_verification_grace_days(),
            sweep_interval_secs: default_sweep_interval(),
            webhook_retention_days: default_webhook_retention_days(),
        }
    }
}

fn default_intent_ttl_hours() -> u32 {
    48
}

fn default_verification_grace_days() -> u32 {
    14
}

fn default_sweep_interval() -> u64 {
    900
}

fn default_webhook_retention_days() -> u32 {
    30
}
