//! HTTP adapter for membership endpoints.
//!
//! - `POST /intents`, `POST /checkout` - Purchase flow
//! - `POST /gift-cards/redeem` - Gift card debits and gift-card-paid purchases
//! - `POST /identity/sessions`, `GET /verification-status` - Verification and polling
//! - `POST /discounts/preview`, `GET /membership` - Read-only views
//! - `POST /webhooks/payment` - Processor events

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{MembershipApiError, MembershipAppState, MembershipPorts, WebhookApiError};
pub use routes::{membership_router, membership_routes, webhook_routes};
