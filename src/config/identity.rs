//! Identity verification configuration

use serde::Deserialize;

use super::error::ValidationError;
use super::payment::check_url;
use super::server::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Where the provider sends the member after the verification flow
    pub verification_return_url: String,
}

impl IdentityConfig {
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        check_url(
            &self.verification_return_url,
            "identity.verification_return_url",
            environment,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_url_required() {
        let config = IdentityConfig {
            verification_return_url: String::new(),
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::MissingRequired(
                "identity.verification_return_url"
            ))
        );
    }

    #[test]
    fn relative_url_rejected() {
        let config = IdentityConfig {
            verification_return_url: "/membership/verified".to_string(),
        };
        assert!(config.validate(&Environment::Development).is_err());
    }
}
