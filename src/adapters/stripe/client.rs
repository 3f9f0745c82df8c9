//! Thin HTTP client for the Stripe REST API.
//!
//! Stripe takes form-encoded bodies and returns JSON. Errors are mapped to
//! [`PaymentError`] codes so callers can tell retryable failures apart.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::ports::{PaymentError, PaymentErrorCode};

use super::webhook_types::StripeErrorBody;

#[derive(Clone)]
pub struct StripeClient {
    api_key: SecretString,
    base_url: String,
    http: reqwest::Client,
}

impl StripeClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PaymentError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::provider(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a form body. `idempotency_key` is sent as `Idempotency-Key`.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http
            .post(self.url(path))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request.send().await.map_err(network_error)?;
        if !response.status().is_success() {
            return Err(api_error(path, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| PaymentError::provider(format!("Failed to parse Stripe response: {}", e)))
    }

    /// GET a resource. A 404 is `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, PaymentError> {
        let response = self
            .http
            .get(self.url(path))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(network_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(path, response).await);
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| PaymentError::provider(format!("Failed to parse Stripe response: {}", e)))
    }
}

fn network_error(err: reqwest::Error) -> PaymentError {
    tracing::warn!(error = %err, "Stripe request failed");
    PaymentError::network(err.to_string())
}

async fn api_error(path: &str, response: reqwest::Response) -> PaymentError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<StripeErrorBody>(&body)
        .ok()
        .map(|b| b.error);

    let code = error_code_for(status);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("Stripe returned {}", status));

    tracing::error!(
        path = %path,
        status = status.as_u16(),
        error = %message,
        "Stripe API error"
    );

    let mut err = PaymentError::new(code, message);
    if let Some(provider_code) = detail.and_then(|d| d.code) {
        err = err.with_provider_code(provider_code);
    }
    err
}

fn error_code_for(status: reqwest::StatusCode) -> PaymentErrorCode {
    match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        400..=499 => PaymentErrorCode::InvalidRequest,
        _ => PaymentErrorCode::ProviderError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_codes_map_to_error_codes() {
        assert_eq!(
            error_code_for(StatusCode::UNAUTHORIZED),
            PaymentErrorCode::AuthenticationError
        );
        assert_eq!(
            error_code_for(StatusCode::TOO_MANY_REQUESTS),
            PaymentErrorCode::RateLimitExceeded
        );
        assert_eq!(
            error_code_for(StatusCode::PAYMENT_REQUIRED),
            PaymentErrorCode::InvalidRequest
        );
        assert_eq!(
            error_code_for(StatusCode::BAD_GATEWAY),
            PaymentErrorCode::ProviderError
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = StripeClient::new(
            SecretString::new("sk_test_x".to_string()),
            "https://api.stripe.com/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.url("/v1/customers"), "https://api.stripe.com/v1/customers");
    }
}
