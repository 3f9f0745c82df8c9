//! Domain layer containing business logic and domain types.
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, auth types)
//! - `membership` - Intents, discounts, gift cards, activation rules

pub mod foundation;
pub mod membership;
