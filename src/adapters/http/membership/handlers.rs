//! HTTP handlers for membership endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::{
    ActivationGuard, CheckVerificationStatusHandler, CheckVerificationStatusQuery,
    CheckoutSettings, CreateIntentCommand, CreateIntentHandler, DiscountLedger,
    ExpireStaleIntentsHandler, GetMembershipHandler, GetMembershipQuery,
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, OpenCheckoutCommand,
    OpenCheckoutHandler, PaymentConfirmation, PreviewDiscountHandler, PreviewDiscountQuery,
    RedeemGiftCardCommand, RedeemGiftCardHandler, StartIdentityVerificationCommand,
    StartIdentityVerificationHandler, SweepPolicy,
};
use crate::domain::foundation::UserId;
use crate::domain::membership::{MembershipError, WebhookError};
use crate::ports::{
    CouponStore, GiftCardStore, IdentityVerifier, IntentRepository, PaymentHistoryRepository,
    PaymentProvider, ProfileRepository, UserMembershipRepository, WebhookEventRepository,
    WebhookResult,
};

use super::super::middleware::{OptionalAuth, RequireAuth};
use super::dto::{
    ActivationResponse, CheckoutRequest, CheckoutResponse, CreateIntentRequest,
    DiscountPreviewRequest, DiscountPreviewResponse, ErrorResponse, HealthResponse,
    IdentitySessionRequest, IdentitySessionResponse, IntentResponse, MembershipResponse,
    RedeemGiftCardRequest, RedeemGiftCardResponse, VerificationStatusParams,
    VerificationStatusResponse, WebhookAckResponse,
};

/// Header carrying the processor's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Storage and provider implementations the membership API runs on.
#[derive(Clone)]
pub struct MembershipPorts {
    pub intents: Arc<dyn IntentRepository>,
    pub memberships: Arc<dyn UserMembershipRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub coupons: Arc<dyn CouponStore>,
    pub gift_cards: Arc<dyn GiftCardStore>,
    pub payments: Arc<dyn PaymentHistoryRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub identity_verifier: Arc<dyn IdentityVerifier>,
}

/// Shared application state containing all dependencies.
///
/// Cloned per request. The confirmation step and activation guard are
/// built once so the webhook and polling paths share them.
#[derive(Clone)]
pub struct MembershipAppState {
    ports: MembershipPorts,
    ledger: Arc<DiscountLedger>,
    confirmation: Arc<PaymentConfirmation>,
    guard: Arc<ActivationGuard>,
    checkout: CheckoutSettings,
    verification_return_url: String,
}

impl MembershipAppState {
    pub fn new(
        ports: MembershipPorts,
        checkout: CheckoutSettings,
        verification_return_url: impl Into<String>,
    ) -> Self {
        let ledger = Arc::new(DiscountLedger::new(
            ports.coupons.clone(),
            ports.gift_cards.clone(),
        ));
        let confirmation = Arc::new(PaymentConfirmation::new(
            ports.intents.clone(),
            ports.memberships.clone(),
            ports.payments.clone(),
            ledger.clone(),
            ports.payment_provider.clone(),
            checkout.currency.clone(),
        ));
        let guard = Arc::new(ActivationGuard::new(
            ports.intents.clone(),
            ports.profiles.clone(),
            ports.memberships.clone(),
            ports.payments.clone(),
            ports.gift_cards.clone(),
        ));
        Self {
            ports,
            ledger,
            confirmation,
            guard,
            checkout,
            verification_return_url: verification_return_url.into(),
        }
    }

    // Handlers are cheap to build; each request gets its own.

    pub fn create_intent_handler(&self) -> CreateIntentHandler {
        CreateIntentHandler::new(self.ports.intents.clone(), self.ledger.clone())
    }

    pub fn open_checkout_handler(&self) -> OpenCheckoutHandler {
        OpenCheckoutHandler::new(
            self.ports.intents.clone(),
            self.ports.profiles.clone(),
            self.ports.payment_provider.clone(),
            self.checkout.clone(),
        )
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(
            self.ports.payment_provider.clone(),
            self.ports.intents.clone(),
            self.ports.memberships.clone(),
            self.ports.profiles.clone(),
            self.ports.payments.clone(),
            self.ports.webhook_events.clone(),
            self.confirmation.clone(),
            self.guard.clone(),
        )
    }

    pub fn verification_status_handler(&self) -> CheckVerificationStatusHandler {
        CheckVerificationStatusHandler::new(
            self.ports.intents.clone(),
            self.ports.profiles.clone(),
            self.ports.payment_provider.clone(),
            self.ports.identity_verifier.clone(),
            self.confirmation.clone(),
            self.guard.clone(),
        )
    }

    pub fn redeem_gift_card_handler(&self) -> RedeemGiftCardHandler {
        RedeemGiftCardHandler::new(
            self.ports.intents.clone(),
            self.ledger.clone(),
            self.guard.clone(),
        )
    }

    pub fn identity_session_handler(&self) -> StartIdentityVerificationHandler {
        StartIdentityVerificationHandler::new(
            self.ports.intents.clone(),
            self.ports.identity_verifier.clone(),
            self.verification_return_url.clone(),
        )
    }

    pub fn preview_discount_handler(&self) -> PreviewDiscountHandler {
        PreviewDiscountHandler::new(self.ledger.clone())
    }

    pub fn get_membership_handler(&self) -> GetMembershipHandler {
        GetMembershipHandler::new(self.ports.memberships.clone())
    }

    pub fn sweep_handler(&self, policy: SweepPolicy) -> ExpireStaleIntentsHandler {
        ExpireStaleIntentsHandler::new(
            self.ports.intents.clone(),
            self.ports.webhook_events.clone(),
            policy,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /verification-status - Poll activation state of the caller's purchase
pub async fn get_verification_status(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
    Query(params): Query<VerificationStatusParams>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let user_id = params
        .user_id
        .map(UserId::new)
        .transpose()
        .map_err(MembershipError::from)?;

    let result = state
        .verification_status_handler()
        .handle(CheckVerificationStatusQuery {
            caller: user.id,
            intent_id: params.intent_id,
            user_id,
        })
        .await?;

    Ok(Json(VerificationStatusResponse::from(result)))
}

/// GET /membership - Current plan of the caller
pub async fn get_membership(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, MembershipApiError> {
    let membership = state
        .get_membership_handler()
        .handle(GetMembershipQuery { user_id: user.id })
        .await?;

    Ok(Json(MembershipResponse::from(membership)))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /intents - Price a purchase and record it as initiated
pub async fn create_intent(
    State(state): State<MembershipAppState>,
    OptionalAuth(user): OptionalAuth,
    Json(request): Json<CreateIntentRequest>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let coupon_requested = request
        .coupon
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty());
    let cmd = CreateIntentCommand {
        user_id: user.map(|u| u.id),
        membership_type: request.membership_type,
        billing_cycle: request.billing_cycle,
        amount: request.amount,
        coupon_code: request.coupon,
        gift_card_code: request.gift_card,
    };

    let result = state.create_intent_handler().handle(cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(IntentResponse::from_result(&result, coupon_requested)),
    ))
}

/// POST /checkout - Open hosted checkout for an intent
pub async fn open_checkout(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let cmd = OpenCheckoutCommand {
        user_id: user.id,
        email: user.email,
        intent_id: request.intent_id,
        price_id: request.price_id,
    };

    let result = state.open_checkout_handler().handle(cmd).await?;

    Ok(Json(CheckoutResponse::from(result)))
}

/// POST /gift-cards/redeem - Debit a gift card, optionally paying for an intent
pub async fn redeem_gift_card(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<RedeemGiftCardRequest>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let cmd = RedeemGiftCardCommand {
        user_id: user.id,
        code: request.code,
        amount_to_use: request.amount_to_use,
        intent_id: request.intent_id,
        idempotency_key: request.idempotency_key,
    };

    let result = state.redeem_gift_card_handler().handle(cmd).await?;

    Ok(Json(RedeemGiftCardResponse::from(result)))
}

/// POST /identity/sessions - Open an identity verification session
pub async fn start_identity_session(
    State(state): State<MembershipAppState>,
    RequireAuth(user): RequireAuth,
    request: Option<Json<IdentitySessionRequest>>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let cmd = StartIdentityVerificationCommand {
        user_id: user.id,
        intent_id: request.intent_id,
    };

    let result = state.identity_session_handler().handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(IdentitySessionResponse::from(result))))
}

/// POST /discounts/preview - Price a purchase without writing anything
pub async fn preview_discount(
    State(state): State<MembershipAppState>,
    Json(request): Json<DiscountPreviewRequest>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let query = PreviewDiscountQuery {
        amount: request.amount,
        coupon_code: request.coupon,
        gift_card_code: request.gift_card,
    };

    let preview = state.preview_discount_handler().handle(query).await?;

    Ok(Json(DiscountPreviewResponse::from(preview)))
}

/// POST /webhooks/payment - Ingest a processor event
///
/// The raw body is passed through untouched; signature verification is
/// computed over the exact bytes received.
pub async fn handle_payment_webhook(
    State(state): State<MembershipAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::InvalidSignature)?;

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let outcome = match state.webhook_handler().handle(cmd).await? {
        WebhookResult::Processed => "processed",
        WebhookResult::Ignored(_) => "ignored",
        WebhookResult::AlreadyProcessed => "already_processed",
    };

    Ok(Json(WebhookAckResponse {
        received: true,
        outcome,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts membership errors to HTTP responses.
#[derive(Debug)]
pub struct MembershipApiError(MembershipError);

impl From<MembershipError> for MembershipApiError {
    fn from(err: MembershipError) -> Self {
        Self(err)
    }
}

impl MembershipApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MembershipError::Authentication => StatusCode::UNAUTHORIZED,
            MembershipError::Validation { .. }
            | MembershipError::SignatureVerification(_)
            | MembershipError::Correlation(_) => StatusCode::BAD_REQUEST,
            MembershipError::PreconditionNotMet(_) => StatusCode::OK,
            MembershipError::ExternalProvider { .. } => StatusCode::BAD_GATEWAY,
            MembershipError::NotFound(_) => StatusCode::NOT_FOUND,
            MembershipError::Forbidden => StatusCode::FORBIDDEN,
            MembershipError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MembershipApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let err = self.0;

        if let MembershipError::PreconditionNotMet(failure) = &err {
            let pending = ActivationResponse {
                active: false,
                pending_reason: Some(failure.to_string()),
            };
            return (StatusCode::OK, Json(pending)).into_response();
        }

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(
                error_code = %err.code(),
                detail = %err.detail(),
                retryable = err.is_retryable(),
                "Membership request failed"
            );
        }

        let body = match &err {
            MembershipError::Validation { field, .. } => ErrorResponse::with_details(
                err.code().to_string(),
                err.message(),
                serde_json::json!({ "field": field }),
            ),
            MembershipError::ExternalProvider { retryable, .. } => ErrorResponse::with_details(
                err.code().to_string(),
                err.message(),
                serde_json::json!({ "retryable": retryable }),
            ),
            _ => ErrorResponse::new(err.code().to_string(), err.message()),
        };

        (status, Json(body)).into_response()
    }
}

/// Webhook failures, mapped so the processor retries only what can succeed
/// on redelivery.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let code = if status.is_server_error() {
            "WEBHOOK_RETRY"
        } else {
            "WEBHOOK_REJECTED"
        };
        (status, Json(ErrorResponse::new(code, self.0.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::membership::{PreconditionFailure, Resource};

    fn status_of(err: MembershipError) -> StatusCode {
        MembershipApiError::from(err).into_response().status()
    }

    #[test]
    fn errors_map_to_documented_statuses() {
        assert_eq!(status_of(MembershipError::Authentication), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(MembershipError::validation("amount", "too small")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(MembershipError::provider("timeout", true)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(MembershipError::NotFound(Resource::GiftCard)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(MembershipError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(MembershipError::infrastructure("pool closed")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn precondition_not_met_is_a_pending_success() {
        let status = status_of(MembershipError::PreconditionNotMet(
            PreconditionFailure::IdentityNotVerified,
        ));
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn webhook_errors_use_redelivery_statuses() {
        let rejected = WebhookApiError::from(WebhookError::InvalidSignature).into_response();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let retry = WebhookApiError::from(WebhookError::Database("down".into())).into_response();
        assert_eq!(retry.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
