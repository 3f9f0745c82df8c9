//! In-memory implementations of the store ports.
//!
//! Used by tests and by local runs without a database. Nothing persists
//! across restarts.

mod coupon_store;
mod gift_card_store;
mod intent_repository;
mod payment_history_repository;
mod profile_repository;
mod user_membership_repository;
mod webhook_event_repository;

pub use coupon_store::InMemoryCouponStore;
pub use gift_card_store::InMemoryGiftCardStore;
pub use intent_repository::InMemoryIntentRepository;
pub use payment_history_repository::InMemoryPaymentHistoryRepository;
pub use profile_repository::InMemoryProfileRepository;
pub use user_membership_repository::InMemoryUserMembershipRepository;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
