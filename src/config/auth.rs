//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Shared-secret settings for validating HS256 session tokens
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,

    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"));
        }
        if secret.len() < 32 {
            return Err(ValidationError::WeakJwtSecret);
        }
        if self.jwt_issuer.trim().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__JWT_ISSUER"));
        }
        Ok(())
    }
}

fn default_issuer() -> String {
    "membership-engine".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::new(secret.to_string()),
            jwt_issuer: default_issuer(),
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        assert_eq!(
            with_secret("short").validate(),
            Err(ValidationError::WeakJwtSecret)
        );
    }

    #[test]
    fn test_empty_secret_missing() {
        assert_eq!(
            with_secret("").validate(),
            Err(ValidationError::MissingRequired("AUTH__JWT_SECRET"))
        );
    }

    #[test]
    fn test_valid_secret() {
        assert!(with_secret(&"k".repeat(32)).validate().is_ok());
    }
}
