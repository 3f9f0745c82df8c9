//! PaymentHistoryRepository port.
//!
//! Rows are keyed by processor invoice id, so recording the same invoice
//! twice leaves one row.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, IntentId};
use crate::domain::membership::PaymentRecord;

use super::SaveResult;

#[async_trait]
pub trait PaymentHistoryRepository: Send + Sync {
    /// Insert or overwrite by `invoice_id`.
    async fn upsert(&self, record: &PaymentRecord) -> Result<SaveResult, DomainError>;

    async fn find_by_invoice_id(&self, invoice_id: &str)
        -> Result<Option<PaymentRecord>, DomainError>;

    /// Returns true if any payment is recorded against the intent.
    async fn exists_for_intent(&self, intent_id: &IntentId) -> Result<bool, DomainError>;
}
