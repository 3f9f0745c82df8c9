//! In-memory gift card store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, GiftCardId, Timestamp, UserId};
use crate::domain::membership::{
    DebitAmount, GiftCard, GiftCardCode, GiftCardDebit, GiftCardTransaction,
};
use crate::ports::GiftCardStore;

#[derive(Default)]
struct State {
    cards: HashMap<GiftCardId, GiftCard>,
    transactions: Vec<GiftCardTransaction>,
}

/// Cards and ledger share one lock so a debit is atomic.
#[derive(Default)]
pub struct InMemoryGiftCardStore {
    state: Mutex<State>,
}

impl InMemoryGiftCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, card: GiftCard) {
        self.state.lock().await.cards.insert(card.id, card);
    }

    pub async fn transactions(&self) -> Vec<GiftCardTransaction> {
        self.state.lock().await.transactions.clone()
    }
}

#[async_trait]
impl GiftCardStore for InMemoryGiftCardStore {
    async fn find_by_code(&self, code: &GiftCardCode) -> Result<Option<GiftCard>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .cards
            .values()
            .find(|c| &c.code == code)
            .cloned())
    }

    async fn find_by_id(&self, id: &GiftCardId) -> Result<Option<GiftCard>, DomainError> {
        Ok(self.state.lock().await.cards.get(id).cloned())
    }

    async fn apply_debit(
        &self,
        id: &GiftCardId,
        user_id: &UserId,
        amount: DebitAmount,
        order_reference: &str,
    ) -> Result<GiftCardDebit, DomainError> {
        let mut state = self.state.lock().await;
        let State { cards, transactions } = &mut *state;

        let card = cards
            .get_mut(id)
            .ok_or_else(|| DomainError::new(ErrorCode::GiftCardNotFound, "gift card not found"))?;

        if let Some(prior) = transactions
            .iter()
            .find(|t| &t.gift_card_id == id && t.order_reference == order_reference)
        {
            return Ok(prior.to_debit(true));
        }

        let now = Timestamp::now();
        let used = card.debit(amount, now).map_err(|e| {
            DomainError::new(ErrorCode::ValidationFailed, e.to_string())
                .with_detail("field", "gift_card")
        })?;

        let transaction = GiftCardTransaction {
            gift_card_id: *id,
            user_id: user_id.clone(),
            amount_used: used,
            balance_after: card.balance,
            status_after: card.status,
            order_reference: order_reference.to_string(),
            created_at: now,
        };
        let debit = transaction.to_debit(false);
        transactions.push(transaction);
        Ok(debit)
    }

    async fn find_transaction(
        &self,
        id: &GiftCardId,
        order_reference: &str,
    ) -> Result<Option<GiftCardTransaction>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .transactions
            .iter()
            .find(|t| &t.gift_card_id == id && t.order_reference == order_reference)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::GiftCardStatus;

    fn card(balance: i64) -> GiftCard {
        GiftCard {
            id: GiftCardId::new(),
            code: GiftCardCode::new("THANKS").unwrap(),
            balance,
            status: GiftCardStatus::Active,
            expires_at: None,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[tokio::test]
    async fn same_order_reference_debits_once() {
        let store = InMemoryGiftCardStore::new();
        let gc = card(5_000);
        let id = gc.id;
        store.put(gc).await;

        let first = store.apply_debit(&id, &user(), DebitAmount::UpTo(2_000), "order-1").await.unwrap();
        let second = store.apply_debit(&id, &user(), DebitAmount::UpTo(2_000), "order-1").await.unwrap();

        assert_eq!(first.amount_used, 2_000);
        assert_eq!(first.remaining_balance, 3_000);
        assert!(!first.already_applied);
        assert_eq!(second.amount_used, first.amount_used);
        assert_eq!(second.remaining_balance, first.remaining_balance);
        assert!(second.already_applied);
        assert_eq!(store.transactions().await.len(), 1);
    }

    #[tokio::test]
    async fn different_orders_debit_separately_until_used() {
        let store = InMemoryGiftCardStore::new();
        let gc = card(3_000);
        let id = gc.id;
        store.put(gc).await;

        store.apply_debit(&id, &user(), DebitAmount::UpTo(2_000), "a").await.unwrap();
        let last = store.apply_debit(&id, &user(), DebitAmount::UpTo(2_000), "b").await.unwrap();

        assert_eq!(last.amount_used, 1_000);
        assert_eq!(last.remaining_balance, 0);
        assert_eq!(last.status, GiftCardStatus::Used);

        let refused = store.apply_debit(&id, &user(), DebitAmount::Balance, "c").await.unwrap_err();
        assert_eq!(refused.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn replay_returns_balance_as_of_the_original_debit() {
        let store = InMemoryGiftCardStore::new();
        let gc = card(5_000);
        let id = gc.id;
        store.put(gc).await;

        let first = store
            .apply_debit(&id, &user(), DebitAmount::UpTo(2_000), "order-1")
            .await
            .unwrap();
        store
            .apply_debit(&id, &user(), DebitAmount::UpTo(3_000), "order-2")
            .await
            .unwrap();
        let replay = store
            .apply_debit(&id, &user(), DebitAmount::UpTo(2_000), "order-1")
            .await
            .unwrap();

        assert_eq!(replay.amount_used, first.amount_used);
        assert_eq!(replay.remaining_balance, 3_000);
        assert_eq!(replay.status, GiftCardStatus::Active);
        assert!(replay.already_applied);
        assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().balance, 0);
    }

    #[tokio::test]
    async fn exact_debit_on_short_card_writes_nothing() {
        let store = InMemoryGiftCardStore::new();
        let gc = card(1_000);
        let id = gc.id;
        store.put(gc).await;

        let refused = store
            .apply_debit(&id, &user(), DebitAmount::Exactly(2_500), "intent:x")
            .await
            .unwrap_err();

        assert_eq!(refused.code, ErrorCode::ValidationFailed);
        assert!(store.transactions().await.is_empty());
        assert_eq!(store.find_by_id(&id).await.unwrap().unwrap().balance, 1_000);
    }

    #[tokio::test]
    async fn lookup_by_code_is_case_insensitive() {
        let store = InMemoryGiftCardStore::new();
        store.put(card(100)).await;
        let found = store
            .find_by_code(&GiftCardCode::new("thanks").unwrap())
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
