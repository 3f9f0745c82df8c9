//! In-process fake payment and identity providers.
//!
//! Used by unit and integration tests. Supports:
//! - Scripted subscriptions, invoices and checkout sessions
//! - Error injection per method
//! - Call tracking
//! - Webhook verification with a real signing secret, or none at all

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::membership::CorrelationMetadata;
use crate::ports::{
    CheckoutSession, CheckoutSessionSnapshot, CreateCheckoutRequest, CreateCouponRequest,
    CreateCustomerRequest, CreateVerificationRequest, Customer, IdentityError, IdentityVerifier,
    InvoiceSnapshot, PaymentError, PaymentProvider, ProcessorCoupon, SubscriptionSnapshot,
    VerificationSession, VerificationStatus, VerifiedEvent,
};

use super::webhook_verifier;

/// Fake payment processor.
///
/// ```ignore
/// let mock = MockPaymentProvider::signed_with("whsec_test");
/// mock.add_subscription(subscription);
/// let session = mock.create_checkout_session(request).await?;
/// mock.complete_checkout(&session.id, "sub_1", Some("in_1"));
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: Vec<Customer>,
    checkout_sessions: HashMap<String, CheckoutSessionSnapshot>,
    checkout_requests: Vec<CreateCheckoutRequest>,
    subscriptions: HashMap<String, SubscriptionSnapshot>,
    invoices: HashMap<String, InvoiceSnapshot>,
    coupons: Vec<CreateCouponRequest>,
    method_errors: HashMap<String, PaymentError>,
    call_log: Vec<MethodCall>,
    webhook_mode: WebhookMode,
    next_id: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

#[derive(Default, Clone)]
enum WebhookMode {
    /// Parse without checking the signature.
    #[default]
    Unsigned,
    /// Verify against a signing secret.
    Signed(String),
    AlwaysFail,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verifies webhooks with `secret`, like the real adapter.
    pub fn signed_with(secret: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.state().webhook_mode = WebhookMode::Signed(secret.into());
        mock
    }

    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_mode = WebhookMode::AlwaysFail;
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Scripting
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_subscription(&self, subscription: SubscriptionSnapshot) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_invoice(&self, invoice: InvoiceSnapshot) {
        self.state().invoices.insert(invoice.id.clone(), invoice);
    }

    pub fn add_checkout_session(&self, session: CheckoutSessionSnapshot) {
        self.state()
            .checkout_sessions
            .insert(session.id.clone(), session);
    }

    /// Marks a session paid and links it to a subscription and invoice.
    pub fn complete_checkout(&self, session_id: &str, subscription_id: &str, invoice_id: Option<&str>) {
        if let Some(session) = self.state().checkout_sessions.get_mut(session_id) {
            session.payment_status = "paid".to_string();
            session.subscription_id = Some(subscription_id.to_string());
            session.invoice_id = invoice_id.map(str::to_string);
        }
    }

    pub fn checkout_session(&self, session_id: &str) -> Option<CheckoutSessionSnapshot> {
        self.state().checkout_sessions.get(session_id).cloned()
    }

    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.state().checkout_requests.clone()
    }

    pub fn created_coupons(&self) -> Vec<CreateCouponRequest> {
        self.state().coupons.clone()
    }

    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    fn begin(&self, method: &str, args: Vec<String>) -> Result<MutexGuard<'_, MockState>, PaymentError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_mock_{}", prefix, self.next_id)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut state = self.begin(
            "create_customer",
            vec![request.user_id.to_string(), request.email.clone()],
        )?;
        let customer = Customer {
            id: state.next_id("cus"),
            email: request.email,
        };
        state.customers.push(customer.clone());
        Ok(customer)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.begin(
            "create_checkout_session",
            vec![request.customer_id.clone(), request.price_id.clone()],
        )?;
        let id = state.next_id("cs");
        state.checkout_sessions.insert(
            id.clone(),
            CheckoutSessionSnapshot {
                id: id.clone(),
                mode: "subscription".to_string(),
                payment_status: "unpaid".to_string(),
                customer_id: Some(request.customer_id.clone()),
                subscription_id: None,
                invoice_id: None,
                amount_total: None,
                currency: None,
                metadata: request.metadata.clone(),
            },
        );
        state.checkout_requests.push(request);
        Ok(CheckoutSession {
            url: format!("https://checkout.example.test/pay/{}", id),
            id,
        })
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionSnapshot>, PaymentError> {
        let state = self.begin("get_checkout_session", vec![session_id.to_string()])?;
        Ok(state.checkout_sessions.get(session_id).cloned())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, PaymentError> {
        let state = self.begin("get_subscription", vec![subscription_id.to_string()])?;
        Ok(state.subscriptions.get(subscription_id).cloned())
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<InvoiceSnapshot>, PaymentError> {
        let state = self.begin("get_invoice", vec![invoice_id.to_string()])?;
        Ok(state.invoices.get(invoice_id).cloned())
    }

    async fn create_coupon(
        &self,
        request: CreateCouponRequest,
    ) -> Result<ProcessorCoupon, PaymentError> {
        let mut state = self.begin("create_coupon", vec![request.amount_off.to_string()])?;
        let id = state.next_id("co");
        state.coupons.push(request);
        Ok(ProcessorCoupon { id })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<VerifiedEvent, PaymentError> {
        let mode = self
            .begin("verify_webhook", vec![signature.to_string()])?
            .webhook_mode
            .clone();
        match mode {
            WebhookMode::Unsigned => webhook_verifier::parse_event(payload, false),
            WebhookMode::Signed(secret) => {
                webhook_verifier::verify_and_parse(&secret, payload, signature, false)
            }
            WebhookMode::AlwaysFail => Err(PaymentError::invalid_webhook("Invalid signature")),
        }
    }
}

/// Fake identity verification provider.
#[derive(Clone, Default)]
pub struct MockIdentityVerifier {
    inner: Arc<Mutex<IdentityState>>,
}

#[derive(Default)]
struct IdentityState {
    sessions: Vec<VerificationSession>,
    lookups: usize,
    fail_with: Option<IdentityError>,
}

impl MockIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, IdentityState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a verified session carrying `correlation`.
    pub fn add_verified_session(&self, correlation: &CorrelationMetadata) {
        let mut state = self.state();
        let id = format!("vs_mock_{}", state.sessions.len() + 1);
        state.sessions.push(VerificationSession {
            id,
            status: VerificationStatus::Verified,
            url: None,
            metadata: correlation.to_map(),
        });
    }

    pub fn fail_with(&self, error: IdentityError) {
        self.state().fail_with = Some(error);
    }

    /// Number of `find_verified_session` calls.
    pub fn lookups(&self) -> usize {
        self.state().lookups
    }

    pub fn sessions(&self) -> Vec<VerificationSession> {
        self.state().sessions.clone()
    }
}

#[async_trait]
impl IdentityVerifier for MockIdentityVerifier {
    async fn create_session(
        &self,
        request: CreateVerificationRequest,
    ) -> Result<VerificationSession, IdentityError> {
        let mut state = self.state();
        if let Some(error) = state.fail_with.clone() {
            return Err(error);
        }
        let id = format!("vs_mock_{}", state.sessions.len() + 1);
        let session = VerificationSession {
            url: Some(format!("https://verify.example.test/{}", id)),
            id,
            status: VerificationStatus::RequiresInput,
            metadata: request.correlation.to_map(),
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn find_verified_session(
        &self,
        correlation: &CorrelationMetadata,
    ) -> Result<Option<VerificationSession>, IdentityError> {
        let mut state = self.state();
        state.lookups += 1;
        if let Some(error) = state.fail_with.clone() {
            return Err(error);
        }
        Ok(state
            .sessions
            .iter()
            .find(|s| s.is_verified() && s.matches(correlation))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::ports::PaymentEvent;

    fn checkout_request() -> CreateCheckoutRequest {
        CreateCheckoutRequest {
            customer_id: "cus_1".into(),
            price_id: "price_basic".into(),
            success_url: "https://app/s".into(),
            cancel_url: "https://app/c".into(),
            metadata: HashMap::from([("user_id".to_string(), "u1".to_string())]),
            coupon_id: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn checkout_session_is_retrievable_and_completable() {
        let mock = MockPaymentProvider::new();
        let session = mock.create_checkout_session(checkout_request()).await.unwrap();

        let snapshot = mock.get_checkout_session(&session.id).await.unwrap().unwrap();
        assert!(!snapshot.is_paid());

        mock.complete_checkout(&session.id, "sub_1", Some("in_1"));
        let snapshot = mock.get_checkout_session(&session.id).await.unwrap().unwrap();
        assert!(snapshot.is_paid());
        assert_eq!(snapshot.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(snapshot.metadata.get("user_id").map(String::as_str), Some("u1"));
    }

    #[tokio::test]
    async fn method_errors_are_injected() {
        let mock = MockPaymentProvider::new();
        mock.set_method_error("get_subscription", PaymentError::network("down"));

        let err = mock.get_subscription("sub_1").await.unwrap_err();
        assert!(err.retryable);
        assert_eq!(mock.call_count("get_subscription"), 1);

        mock.clear_errors();
        assert!(mock.get_subscription("sub_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn signed_mode_checks_signature() {
        let mock = MockPaymentProvider::signed_with("whsec_mock");
        let payload = br#"{"id":"evt_1","type":"x.y","created":1,"data":{"object":{}}}"#;

        assert!(mock.verify_webhook(payload, "t=1,v1=00").await.is_err());

        let header =
            webhook_verifier::sign_payload("whsec_mock", chrono::Utc::now().timestamp(), payload);
        let event = mock.verify_webhook(payload, &header).await.unwrap();
        assert_eq!(event.payload, PaymentEvent::Unknown);
    }

    #[tokio::test]
    async fn rejecting_mode_fails_everything() {
        let mock = MockPaymentProvider::rejecting_webhooks();
        assert!(mock.verify_webhook(b"{}", "anything").await.is_err());
    }

    #[tokio::test]
    async fn identity_mock_finds_only_verified_matching_sessions() {
        let mock = MockIdentityVerifier::new();
        let corr = CorrelationMetadata::for_user(UserId::new("u1").unwrap());

        mock.create_session(CreateVerificationRequest {
            correlation: corr.clone(),
            return_url: "https://app/v".into(),
        })
        .await
        .unwrap();
        assert!(mock.find_verified_session(&corr).await.unwrap().is_none());

        mock.add_verified_session(&corr);
        assert!(mock.find_verified_session(&corr).await.unwrap().is_some());

        let other = CorrelationMetadata::for_user(UserId::new("u2").unwrap());
        assert!(mock.find_verified_session(&other).await.unwrap().is_none());
        assert_eq!(mock.lookups(), 3);
    }
}
