//! Stripe payment provider adapter.
//!
//! Implements [`PaymentProvider`] over the Stripe REST API: customers,
//! subscription checkout, snapshot retrieval, one-time coupons and
//! webhook verification.
//!
//! ```ignore
//! let config = StripeConfig::from_payment_config(&app_config.payment);
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::config::PaymentConfig;
use crate::ports::{
    CheckoutSession, CheckoutSessionSnapshot, CreateCheckoutRequest, CreateCouponRequest,
    CreateCustomerRequest, Customer, InvoiceSnapshot, PaymentError, PaymentProvider,
    ProcessorCoupon, SubscriptionSnapshot, VerifiedEvent,
};

use super::client::StripeClient;
use super::webhook_types::{
    StripeCheckoutSession, StripeCoupon, StripeCustomer, StripeInvoice, StripeSubscription,
};
use super::webhook_verifier;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    api_key: SecretString,
    webhook_secret: SecretString,
    api_base_url: String,
    require_livemode: bool,
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn from_payment_config(config: &PaymentConfig) -> Self {
        Self {
            api_key: config.stripe_api_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            api_base_url: config.api_base_url.clone(),
            require_livemode: config.require_livemode,
            timeout: config.provider_timeout(),
        }
    }

    /// Custom API base URL (stripe-mock, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Client sharing this configuration's key and base URL.
    pub fn client(&self) -> Result<StripeClient, PaymentError> {
        StripeClient::new(self.api_key.clone(), self.api_base_url.clone(), self.timeout)
    }
}

pub struct StripePaymentAdapter {
    config: StripeConfig,
    client: StripeClient,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let client = config.client()?;
        Ok(Self { config, client })
    }
}

pub(super) fn metadata_params(
    prefix: &str,
    metadata: &std::collections::HashMap<String, String>,
) -> Vec<(String, String)> {
    let mut keys: Vec<_> = metadata.keys().collect();
    keys.sort();
    keys.into_iter()
        .map(|k| (format!("{}[{}]", prefix, k), metadata[k].clone()))
        .collect()
}

fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("customer".to_string(), request.customer_id.clone()),
        ("line_items[0][price]".to_string(), request.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
    ];
    // Set on the subscription as well so renewal and deletion events carry it
    params.extend(metadata_params("metadata", &request.metadata));
    params.extend(metadata_params(
        "subscription_data[metadata]",
        &request.metadata,
    ));
    if let Some(coupon) = &request.coupon_id {
        params.push(("discounts[0][coupon]".to_string(), coupon.clone()));
    }
    params
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut params = vec![
            ("email".to_string(), request.email.clone()),
            ("metadata[user_id]".to_string(), request.user_id.to_string()),
        ];
        if let Some(name) = &request.name {
            params.push(("name".to_string(), name.clone()));
        }

        let customer: StripeCustomer = self
            .client
            .post_form("/v1/customers", &params, request.idempotency_key.as_deref())
            .await?;

        tracing::info!(user_id = %request.user_id, customer_id = %customer.id, "Stripe customer created");
        Ok(Customer {
            id: customer.id,
            email: customer.email.unwrap_or(request.email),
        })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: StripeCheckoutSession = self
            .client
            .post_form(
                "/v1/checkout/sessions",
                &checkout_params(&request),
                request.idempotency_key.as_deref(),
            )
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session has no URL"))?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSessionSnapshot>, PaymentError> {
        let session: Option<StripeCheckoutSession> = self
            .client
            .get(&format!("/v1/checkout/sessions/{}", session_id), &[])
            .await?;
        Ok(session.map(Into::into))
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionSnapshot>, PaymentError> {
        let sub: Option<StripeSubscription> = self
            .client
            .get(&format!("/v1/subscriptions/{}", subscription_id), &[])
            .await?;
        Ok(sub.map(Into::into))
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<InvoiceSnapshot>, PaymentError> {
        let invoice: Option<StripeInvoice> = self
            .client
            .get(&format!("/v1/invoices/{}", invoice_id), &[])
            .await?;
        Ok(invoice.map(Into::into))
    }

    async fn create_coupon(
        &self,
        request: CreateCouponRequest,
    ) -> Result<ProcessorCoupon, PaymentError> {
        let params = vec![
            ("amount_off".to_string(), request.amount_off.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("duration".to_string(), "once".to_string()),
            ("max_redemptions".to_string(), "1".to_string()),
            ("name".to_string(), request.name.clone()),
        ];
        let coupon: StripeCoupon = self
            .client
            .post_form("/v1/coupons", &params, request.idempotency_key.as_deref())
            .await?;
        Ok(ProcessorCoupon { id: coupon.id })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<VerifiedEvent, PaymentError> {
        webhook_verifier::verify_and_parse(
            self.config.webhook_secret.expose_secret(),
            payload,
            signature,
            self.config.require_livemode,
        )
    }
}
