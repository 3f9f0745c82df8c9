//! In-memory payment history keyed by invoice id.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, IntentId};
use crate::domain::membership::PaymentRecord;
use crate::ports::{PaymentHistoryRepository, SaveResult};

#[derive(Default)]
pub struct InMemoryPaymentHistoryRepository {
    records: RwLock<HashMap<String, PaymentRecord>>,
}

impl InMemoryPaymentHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentHistoryRepository for InMemoryPaymentHistoryRepository {
    async fn upsert(&self, record: &PaymentRecord) -> Result<SaveResult, DomainError> {
        let previous = self
            .records
            .write()
            .await
            .insert(record.invoice_id.clone(), record.clone());
        Ok(match previous {
            Some(_) => SaveResult::AlreadyExists,
            None => SaveResult::Inserted,
        })
    }

    async fn find_by_invoice_id(
        &self,
        invoice_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        Ok(self.records.read().await.get(invoice_id).cloned())
    }

    async fn exists_for_intent(&self, intent_id: &IntentId) -> Result<bool, DomainError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| r.intent_id.as_ref() == Some(intent_id)))
    }
}
