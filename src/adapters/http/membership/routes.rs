//! Axum router configuration for membership endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::super::middleware::{auth_middleware, AuthState};
use super::handlers::{
    create_intent, get_membership, get_verification_status, handle_payment_webhook, health,
    open_checkout, preview_discount, redeem_gift_card, start_identity_session,
    MembershipAppState,
};

/// Member-facing routes. Expect `auth_middleware` to run in front of them.
///
/// - `POST /intents` - Price and record a purchase
/// - `POST /checkout` - Open hosted checkout
/// - `GET /verification-status` - Poll activation state
/// - `POST /gift-cards/redeem` - Debit a gift card
/// - `POST /identity/sessions` - Start identity verification
/// - `POST /discounts/preview` - Price without writing
/// - `GET /membership` - Current plan
pub fn membership_routes() -> Router<MembershipAppState> {
    Router::new()
        .route("/intents", post(create_intent))
        .route("/checkout", post(open_checkout))
        .route("/verification-status", get(get_verification_status))
        .route("/gift-cards/redeem", post(redeem_gift_card))
        .route("/identity/sessions", post(start_identity_session))
        .route("/discounts/preview", post(preview_discount))
        .route("/membership", get(get_membership))
}

/// Processor webhooks. Authenticated by signature, not by bearer token.
///
/// - `POST /payment` - Payment and identity events
pub fn webhook_routes() -> Router<MembershipAppState> {
    Router::new().route("/payment", post(handle_payment_webhook))
}

/// Complete membership router with auth applied to member routes only.
///
/// ```ignore
/// let app = membership_router(validator).with_state(state);
/// ```
pub fn membership_router(validator: AuthState) -> Router<MembershipAppState> {
    Router::new()
        .merge(
            membership_routes()
                .route_layer(middleware::from_fn_with_state(validator, auth_middleware)),
        )
        .nest("/webhooks", webhook_routes())
        .route("/health", get(health))
}
