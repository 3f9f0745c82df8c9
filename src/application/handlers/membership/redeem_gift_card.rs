//! RedeemGiftCardHandler - Command handler for gift card redemption.
//!
//! With an intent, this is how a purchase fully covered by a gift card is
//! paid: the debit is keyed on the intent, and once it covers the quoted
//! amount the intent moves on to the activation guard. Without an intent it
//! is a plain idempotent debit.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::foundation::{GiftCardId, IntentId, Timestamp, UserId};
use crate::domain::membership::{
    validate_amount, ActivationOutcome, DebitAmount, GiftCardCode, GiftCardDebit, IntentStatus,
    MembershipError, MembershipIntent, Resource,
};
use crate::ports::IntentRepository;

use super::{ActivationGuard, DiscountLedger};

/// Command to redeem a gift card.
#[derive(Debug, Clone)]
pub struct RedeemGiftCardCommand {
    pub user_id: UserId,
    pub code: String,
    /// Defaults to the whole balance. Ignored when paying for an intent.
    pub amount_to_use: Option<i64>,
    pub intent_id: Option<IntentId>,
    /// Client key making a standalone redemption safe to retry.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RedeemGiftCardResult {
    pub debit: GiftCardDebit,
    /// Present when the redemption paid for an intent.
    pub activation: Option<ActivationOutcome>,
}

pub struct RedeemGiftCardHandler {
    intents: Arc<dyn IntentRepository>,
    ledger: Arc<DiscountLedger>,
    guard: Arc<ActivationGuard>,
}

impl RedeemGiftCardHandler {
    pub fn new(
        intents: Arc<dyn IntentRepository>,
        ledger: Arc<DiscountLedger>,
        guard: Arc<ActivationGuard>,
    ) -> Self {
        Self {
            intents,
            ledger,
            guard,
        }
    }

    pub async fn handle(
        &self,
        cmd: RedeemGiftCardCommand,
    ) -> Result<RedeemGiftCardResult, MembershipError> {
        // 1. Validate input
        let code = GiftCardCode::new(&cmd.code)?;
        if let Some(amount) = cmd.amount_to_use {
            validate_amount(amount)?;
        }

        // 2. Find the card; redeemability is checked by the debit so that
        //    retries of a completed redemption still succeed
        let card = self
            .ledger
            .find_gift_card(&code)
            .await?
            .ok_or(MembershipError::NotFound(Resource::GiftCard))?;

        match cmd.intent_id {
            Some(intent_id) => self.pay_intent(&cmd.user_id, card.id, intent_id).await,
            None => {
                let order_reference = match cmd.idempotency_key.as_deref().map(str::trim) {
                    Some(key) if !key.is_empty() => format!("redeem:{}:{}", cmd.user_id, key),
                    _ => format!("redeem:{}", Uuid::new_v4()),
                };
                let debit = self
                    .ledger
                    .apply_gift_card(
                        &card.id,
                        &cmd.user_id,
                        DebitAmount::up_to(cmd.amount_to_use),
                        &order_reference,
                    )
                    .await?;
                Ok(RedeemGiftCardResult {
                    debit,
                    activation: None,
                })
            }
        }
    }

    async fn pay_intent(
        &self,
        user_id: &UserId,
        gift_card_id: GiftCardId,
        intent_id: IntentId,
    ) -> Result<RedeemGiftCardResult, MembershipError> {
        let intent = self
            .intents
            .find_by_id(&intent_id)
            .await?
            .ok_or(MembershipError::NotFound(Resource::Intent))?;
        check_payable(&intent, user_id, gift_card_id)?;

        // A card spent down since quoting is refused whole, not burned
        // partially, so the member can start a fresh purchase.
        let debit = self
            .ledger
            .apply_gift_card(
                &gift_card_id,
                user_id,
                DebitAmount::Exactly(intent.gift_card_applied_amount),
                &intent.id.order_reference(),
            )
            .await
            .map_err(|err| {
                if matches!(err, MembershipError::Validation { .. }) {
                    tracing::warn!(
                        intent_id = %intent.id,
                        expected = intent.gift_card_applied_amount,
                        error = %err,
                        "Gift card no longer covers the purchase"
                    );
                }
                err
            })?;

        self.intents
            .transition(
                &intent.id,
                IntentStatus::Initiated,
                IntentStatus::PaidPendingVerification,
                Timestamp::now(),
            )
            .await?;
        let outcome = self.guard.activate(&intent.id).await?;

        tracing::info!(
            intent_id = %intent.id,
            user_id = %user_id,
            outcome = ?outcome,
            "Purchase paid by gift card"
        );
        Ok(RedeemGiftCardResult {
            debit,
            activation: Some(outcome),
        })
    }
}

fn check_payable(
    intent: &MembershipIntent,
    user_id: &UserId,
    gift_card_id: GiftCardId,
) -> Result<(), MembershipError> {
    if !intent.is_owner(user_id) {
        return Err(MembershipError::Forbidden);
    }
    if intent.gift_card_id != Some(gift_card_id) {
        return Err(MembershipError::validation(
            "code",
            "gift card is not part of this purchase",
        ));
    }
    if !intent.is_fully_covered() {
        return Err(MembershipError::validation(
            "intentId",
            "purchase needs checkout for the remaining amount",
        ));
    }
    if matches!(intent.status, IntentStatus::Cancelled | IntentStatus::Expired) {
        return Err(MembershipError::validation(
            "intentId",
            format!("purchase is {}", intent.status.as_str()),
        ));
    }
    Ok(())
}
