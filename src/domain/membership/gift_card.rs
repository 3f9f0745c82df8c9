//! Gift card balance rules.
//!
//! Balance never goes below zero. A card becomes `Used` exactly when a
//! redemption brings its balance to zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::foundation::{GiftCardId, Timestamp, UserId, ValidationError};

/// Case-insensitive gift card code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GiftCardCode(String);

impl GiftCardCode {
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ValidationError::empty_field("gift_card_code"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GiftCardCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a gift card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftCardStatus {
    Pending,
    Active,
    Used,
    Expired,
    Disabled,
}

impl GiftCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftCardStatus::Pending => "pending",
            GiftCardStatus::Active => "active",
            GiftCardStatus::Used => "used",
            GiftCardStatus::Expired => "expired",
            GiftCardStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for GiftCardStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GiftCardStatus::Pending),
            "active" => Ok(GiftCardStatus::Active),
            "used" => Ok(GiftCardStatus::Used),
            "expired" => Ok(GiftCardStatus::Expired),
            "disabled" => Ok(GiftCardStatus::Disabled),
            other => Err(ValidationError::invalid_format(
                "gift_card_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Reasons a debit is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GiftCardError {
    #[error("Gift card is not redeemable (status: {0})")]
    NotRedeemable(&'static str),

    #[error("Gift card has expired")]
    Expired,

    #[error("Requested amount must be positive")]
    InvalidAmount,

    #[error("Gift card balance {available} does not cover {required}")]
    InsufficientBalance { available: i64, required: i64 },
}

/// How much a debit may take from a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitAmount {
    /// The whole remaining balance.
    Balance,
    /// Up to this amount, clamped to the balance.
    UpTo(i64),
    /// Exactly this amount. A shorter balance refuses the debit.
    Exactly(i64),
}

impl DebitAmount {
    /// `UpTo(amount)` when given, otherwise the whole balance.
    pub fn up_to(amount: Option<i64>) -> Self {
        amount.map_or(DebitAmount::Balance, DebitAmount::UpTo)
    }
}

/// A stored-value gift card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftCard {
    pub id: GiftCardId,
    pub code: GiftCardCode,
    pub balance: i64,
    pub status: GiftCardStatus,
    pub expires_at: Option<Timestamp>,
}

impl GiftCard {
    /// Returns true if the card can pay for something right now.
    pub fn is_redeemable(&self, now: Timestamp) -> bool {
        self.status == GiftCardStatus::Active
            && self.balance > 0
            && self.expires_at.map_or(true, |at| now.is_before(&at))
    }

    /// Debits the card. Returns the amount actually taken.
    ///
    /// A refused debit leaves balance and status untouched.
    pub fn debit(&mut self, amount: DebitAmount, now: Timestamp) -> Result<i64, GiftCardError> {
        if let Some(at) = self.expires_at {
            if !now.is_before(&at) {
                return Err(GiftCardError::Expired);
            }
        }
        if self.status != GiftCardStatus::Active || self.balance <= 0 {
            return Err(GiftCardError::NotRedeemable(self.status.as_str()));
        }

        let requested = match amount {
            DebitAmount::Balance => self.balance,
            DebitAmount::UpTo(n) | DebitAmount::Exactly(n) => n,
        };
        if requested <= 0 {
            return Err(GiftCardError::InvalidAmount);
        }
        if matches!(amount, DebitAmount::Exactly(_)) && requested > self.balance {
            return Err(GiftCardError::InsufficientBalance {
                available: self.balance,
                required: requested,
            });
        }

        let used = requested.min(self.balance);
        self.balance = (self.balance - used).max(0);
        if self.balance == 0 {
            self.status = GiftCardStatus::Used;
        }
        Ok(used)
    }
}

/// Append-only ledger row for one debit.
///
/// `(gift_card_id, order_reference)` is unique. The card's balance and
/// status right after the debit are kept so a replay can return them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftCardTransaction {
    pub gift_card_id: GiftCardId,
    pub user_id: UserId,
    pub amount_used: i64,
    pub balance_after: i64,
    pub status_after: GiftCardStatus,
    pub order_reference: String,
    pub created_at: Timestamp,
}

impl GiftCardTransaction {
    /// The debit result this row records.
    pub fn to_debit(&self, already_applied: bool) -> GiftCardDebit {
        GiftCardDebit {
            gift_card_id: self.gift_card_id,
            amount_used: self.amount_used,
            remaining_balance: self.balance_after,
            status: self.status_after,
            already_applied,
        }
    }
}

/// Outcome of an idempotent debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiftCardDebit {
    pub gift_card_id: GiftCardId,
    pub amount_used: i64,
    pub remaining_balance: i64,
    pub status: GiftCardStatus,
    /// True when the order reference had already been debited and the
    /// prior result was returned.
    pub already_applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(balance: i64) -> GiftCard {
        GiftCard {
            id: GiftCardId::new(),
            code: GiftCardCode::new("gift-100").unwrap(),
            balance,
            status: GiftCardStatus::Active,
            expires_at: None,
        }
    }

    #[test]
    fn code_is_case_insensitive() {
        assert_eq!(
            GiftCardCode::new("abc-123").unwrap(),
            GiftCardCode::new(" ABC-123").unwrap()
        );
        assert!(GiftCardCode::new("  ").is_err());
    }

    #[test]
    fn partial_debit_keeps_card_active() {
        let mut gc = card(5_000);
        let used = gc.debit(DebitAmount::UpTo(2_000), Timestamp::now()).unwrap();
        assert_eq!(used, 2_000);
        assert_eq!(gc.balance, 3_000);
        assert_eq!(gc.status, GiftCardStatus::Active);
    }

    #[test]
    fn over_debit_clamps_and_marks_used() {
        let mut gc = card(5_000);
        let used = gc.debit(DebitAmount::UpTo(9_000), Timestamp::now()).unwrap();
        assert_eq!(used, 5_000);
        assert_eq!(gc.balance, 0);
        assert_eq!(gc.status, GiftCardStatus::Used);
    }

    #[test]
    fn debit_without_amount_takes_everything() {
        let mut gc = card(1_250);
        assert_eq!(gc.debit(DebitAmount::Balance, Timestamp::now()).unwrap(), 1_250);
        assert_eq!(gc.status, GiftCardStatus::Used);
    }

    #[test]
    fn used_card_cannot_be_debited() {
        let mut gc = card(100);
        gc.debit(DebitAmount::Balance, Timestamp::now()).unwrap();
        assert_eq!(
            gc.debit(DebitAmount::UpTo(1), Timestamp::now()),
            Err(GiftCardError::NotRedeemable("used"))
        );
    }

    #[test]
    fn expired_card_is_not_redeemable() {
        let now = Timestamp::now();
        let mut gc = card(100);
        gc.expires_at = Some(now.add_days(-1));
        assert!(!gc.is_redeemable(now));
        assert_eq!(gc.debit(DebitAmount::Balance, now), Err(GiftCardError::Expired));
    }

    #[test]
    fn non_positive_request_is_rejected() {
        let mut gc = card(100);
        assert_eq!(
            gc.debit(DebitAmount::UpTo(0), Timestamp::now()),
            Err(GiftCardError::InvalidAmount)
        );
        assert_eq!(gc.balance, 100);
    }

    #[test]
    fn exact_debit_refuses_short_balance_without_touching_it() {
        let mut gc = card(1_500);
        assert_eq!(
            gc.debit(DebitAmount::Exactly(2_000), Timestamp::now()),
            Err(GiftCardError::InsufficientBalance {
                available: 1_500,
                required: 2_000
            })
        );
        assert_eq!(gc.balance, 1_500);
        assert_eq!(gc.status, GiftCardStatus::Active);

        assert_eq!(gc.debit(DebitAmount::Exactly(1_500), Timestamp::now()), Ok(1_500));
        assert_eq!(gc.status, GiftCardStatus::Used);
    }
}
