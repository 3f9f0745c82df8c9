//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresIntentRepository` - purchase intents with compare-and-set transitions
//! - `PostgresUserMembershipRepository` - current plan per user
//! - `PostgresProfileRepository` - profile fields and the membership projection
//! - `PostgresCouponStore` / `PostgresGiftCardStore` - discount sources
//! - `PostgresPaymentHistoryRepository` - payments keyed by invoice id
//! - `PostgresWebhookEventRepository` - processed-event ledger
//!
//! Schema lives in `migrations/`.

mod coupon_store;
mod gift_card_store;
mod intent_repository;
mod payment_history_repository;
mod profile_repository;
mod user_membership_repository;
mod webhook_event_repository;

pub use coupon_store::PostgresCouponStore;
pub use gift_card_store::PostgresGiftCardStore;
pub use intent_repository::PostgresIntentRepository;
pub use payment_history_repository::PostgresPaymentHistoryRepository;
pub use profile_repository::PostgresProfileRepository;
pub use user_membership_repository::PostgresUserMembershipRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;

use std::fmt::Display;
use std::str::FromStr;

use sqlx::PgPool;

use crate::domain::foundation::{DomainError, UserId};

/// Applies pending migrations from `migrations/`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database(format!("Migration failed: {}", e)))
}

/// Maps a sqlx error to a database error naming the failed action.
fn query_failed(action: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| DomainError::database(format!("Failed to {}: {}", action, e))
}

/// Parses a text column into a domain enum.
fn parse_column<T>(column: &str, value: &str) -> Result<T, DomainError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| DomainError::database(format!("Invalid {} value '{}': {}", column, value, e)))
}

fn parse_user_id(value: String) -> Result<UserId, DomainError> {
    UserId::new(value).map_err(|e| DomainError::database(format!("Invalid user_id: {}", e)))
}
