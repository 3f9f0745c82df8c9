//! WebhookEventRepository port - ledger of processed webhook events.
//!
//! Processors deliver at least once. An event id recorded here
//! short-circuits redelivery before any reconciliation runs. Only events
//! that were handled or deliberately ignored are recorded; a failed attempt
//! is left out so the next delivery retries it.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// How a recorded event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Success,
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Success => "success",
            WebhookOutcome::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ignored" => WebhookOutcome::Ignored,
            _ => WebhookOutcome::Success,
        }
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Processor event id (evt_xxx).
    pub event_id: String,
    pub event_type: String,
    pub processed_at: Timestamp,
    pub outcome: WebhookOutcome,
    /// Why the event was ignored, if it was.
    pub note: Option<String>,
    /// Original body for auditing.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: WebhookOutcome::Success,
            note: None,
            payload,
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: WebhookOutcome::Ignored,
            note: Some(reason.into()),
            payload,
        }
    }
}

/// Result of an insert keyed by a natural id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First write for this key.
    Inserted,
    /// A row with this key already existed.
    AlreadyExists,
}

/// Port for the processed-event ledger.
///
/// Implementations key on `event_id` so concurrent deliveries of one event
/// record at most one row.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Insert with do-nothing-on-conflict semantics.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Delete records processed before `cutoff`. Returns rows deleted.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResult {
    /// Reconciled.
    Processed,
    /// Acknowledged without changes.
    Ignored(String),
    /// Event id already in the ledger.
    AlreadyProcessed,
}
