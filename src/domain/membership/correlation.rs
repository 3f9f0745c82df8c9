//! Correlation metadata attached to processor objects.
//!
//! The keys written at checkout (and on identity sessions) are echoed back
//! on every later event. They are the only link from processor objects to
//! internal intents and users.

use std::collections::HashMap;
use thiserror::Error;

use super::{BillingCycle, MembershipType};
use crate::domain::foundation::{IntentId, UserId};

pub const INTENT_ID_KEY: &str = "intent_id";
pub const USER_ID_KEY: &str = "user_id";
pub const MEMBERSHIP_TYPE_KEY: &str = "membership_type";
pub const BILLING_CYCLE_KEY: &str = "billing_cycle";

/// Metadata could not be mapped to an internal user or intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("metadata missing '{0}'")]
    Missing(&'static str),

    #[error("metadata '{key}' is malformed")]
    Malformed { key: &'static str },
}

/// Parsed correlation metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationMetadata {
    pub user_id: UserId,
    pub intent_id: Option<IntentId>,
    pub membership_type: Option<MembershipType>,
    pub billing_cycle: Option<BillingCycle>,
}

impl CorrelationMetadata {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            intent_id: None,
            membership_type: None,
            billing_cycle: None,
        }
    }

    pub fn with_intent(mut self, intent_id: IntentId) -> Self {
        self.intent_id = Some(intent_id);
        self
    }

    pub fn with_plan(mut self, membership_type: MembershipType, billing_cycle: BillingCycle) -> Self {
        self.membership_type = Some(membership_type);
        self.billing_cycle = Some(billing_cycle);
        self
    }

    /// Flattens to the string map sent to the processor.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(USER_ID_KEY.to_string(), self.user_id.to_string());
        if let Some(id) = self.intent_id {
            map.insert(INTENT_ID_KEY.to_string(), id.to_string());
        }
        if let Some(t) = self.membership_type {
            map.insert(MEMBERSHIP_TYPE_KEY.to_string(), t.as_str().to_string());
        }
        if let Some(c) = self.billing_cycle {
            map.insert(BILLING_CYCLE_KEY.to_string(), c.as_str().to_string());
        }
        map
    }

    /// Parses metadata echoed back by the processor.
    ///
    /// `user_id` is required. A present but malformed optional key is an
    /// error rather than silently dropped.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, CorrelationError> {
        let user_id = map
            .get(USER_ID_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or(CorrelationError::Missing(USER_ID_KEY))?;
        let user_id = UserId::new(user_id.as_str()).map_err(|_| CorrelationError::Malformed {
            key: USER_ID_KEY,
        })?;

        let intent_id = parse_optional(map, INTENT_ID_KEY, |v| v.parse::<IntentId>().ok())?;
        let membership_type = parse_optional(map, MEMBERSHIP_TYPE_KEY, |v| v.parse().ok())?;
        let billing_cycle = parse_optional(map, BILLING_CYCLE_KEY, |v| v.parse().ok())?;

        Ok(Self {
            user_id,
            intent_id,
            membership_type,
            billing_cycle,
        })
    }
}

fn parse_optional<T>(
    map: &HashMap<String, String>,
    key: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, CorrelationError> {
    match map.get(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => parse(v).map(Some).ok_or(CorrelationError::Malformed { key }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_map() {
        let meta = CorrelationMetadata::for_user(UserId::new("user-9").unwrap())
            .with_intent(IntentId::new())
            .with_plan(MembershipType::Vip, BillingCycle::Monthly);
        let parsed = CorrelationMetadata::from_map(&meta.to_map()).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn missing_user_id_is_correlation_error() {
        let mut map = HashMap::new();
        map.insert(INTENT_ID_KEY.to_string(), IntentId::new().to_string());
        assert_eq!(
            CorrelationMetadata::from_map(&map),
            Err(CorrelationError::Missing(USER_ID_KEY))
        );
    }

    #[test]
    fn malformed_intent_id_is_rejected() {
        let mut map = HashMap::new();
        map.insert(USER_ID_KEY.to_string(), "user-9".to_string());
        map.insert(INTENT_ID_KEY.to_string(), "nope".to_string());
        assert_eq!(
            CorrelationMetadata::from_map(&map),
            Err(CorrelationError::Malformed { key: INTENT_ID_KEY })
        );
    }

    #[test]
    fn user_only_metadata_is_accepted() {
        let mut map = HashMap::new();
        map.insert(USER_ID_KEY.to_string(), "user-9".to_string());
        let parsed = CorrelationMetadata::from_map(&map).unwrap();
        assert_eq!(parsed.intent_id, None);
    }
}
