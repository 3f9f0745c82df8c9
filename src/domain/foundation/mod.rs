//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait, and error
//! types that form the vocabulary of the membership engine.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{GiftCardId, IntentId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
