//! Payment processor configuration (Stripe)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key (`sk_test_...` / `sk_live_...`)
    pub stripe_api_key: SecretString,

    /// Webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: SecretString,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// ISO 4217 currency used for one-time checkout coupons
    #[serde(default = "default_currency")]
    pub currency: String,

    pub checkout_success_url: String,

    pub checkout_cancel_url: String,

    /// Reject test-mode webhook events
    #[serde(default)]
    pub require_livemode: bool,

    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
}

impl PaymentConfig {
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired(
                "PAYMENT__STRIPE_WEBHOOK_SECRET",
            ));
        }
        if !api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(self.currency.clone()));
        }
        if self.provider_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("payment.provider_timeout_secs"));
        }

        check_url(&self.api_base_url, "payment.api_base_url", environment)?;
        check_url(
            &self.checkout_success_url,
            "payment.checkout_success_url",
            environment,
        )?;
        check_url(
            &self.checkout_cancel_url,
            "payment.checkout_cancel_url",
            environment,
        )?;
        Ok(())
    }
}

/// Absolute http(s) URL; HTTPS only in production.
pub(super) fn check_url(
    url: &str,
    name: &'static str,
    environment: &Environment,
) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(ValidationError::MissingRequired(name));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(ValidationError::InvalidUrl(name));
    }
    if *environment == Environment::Production && !url.starts_with("https://") {
        return Err(ValidationError::MustBeHttps(name));
    }
    Ok(())
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_provider_timeout() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: SecretString::new("sk_test_abc".to_string()),
            stripe_webhook_secret: SecretString::new("whsec_abc".to_string()),
            api_base_url: default_api_base_url(),
            currency: default_currency(),
            checkout_success_url: "https://app.example.com/membership/success".to_string(),
            checkout_cancel_url: "https://app.example.com/membership/cancel".to_string(),
            require_livemode: false,
            provider_timeout_secs: default_provider_timeout(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate(&Environment::Production).is_ok());
        assert!(config().is_test_mode());
        assert!(!config().is_live_mode());
    }

    #[test]
    fn test_key_prefixes_are_checked() {
        let bad_key = PaymentConfig {
            stripe_api_key: SecretString::new("pk_test_abc".to_string()),
            ..config()
        };
        assert_eq!(
            bad_key.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeKey)
        );

        let bad_secret = PaymentConfig {
            stripe_webhook_secret: SecretString::new("secret".to_string()),
            ..config()
        };
        assert_eq!(
            bad_secret.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_missing_key() {
        let missing = PaymentConfig {
            stripe_api_key: SecretString::new(String::new()),
            ..config()
        };
        assert_eq!(
            missing.validate(&Environment::Development),
            Err(ValidationError::MissingRequired("PAYMENT__STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_currency_must_be_three_letters() {
        let bad = PaymentConfig {
            currency: "dollars".to_string(),
            ..config()
        };
        assert!(matches!(
            bad.validate(&Environment::Development),
            Err(ValidationError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn test_plain_http_only_outside_production() {
        let local = PaymentConfig {
            checkout_success_url: "http://localhost:5173/success".to_string(),
            ..config()
        };
        assert!(local.validate(&Environment::Development).is_ok());
        assert_eq!(
            local.validate(&Environment::Production),
            Err(ValidationError::MustBeHttps("payment.checkout_success_url"))
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("sk_test_abc"));
        assert!(!rendered.contains("whsec_abc"));
    }
}
