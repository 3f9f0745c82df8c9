//! Application configuration
//!
//! Loaded from environment variables with the `MEMBERSHIP_ENGINE` prefix;
//! nested values use `__` as separator, e.g.
//! `MEMBERSHIP_ENGINE__PAYMENT__STRIPE_API_KEY`. A `.env` file is read
//! first when present.

mod auth;
mod database;
mod error;
mod identity;
mod lifecycle;
mod payment;
mod server;

pub use auth::AuthConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use identity::IdentityConfig;
pub use lifecycle::LifecycleConfig;
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub payment: PaymentConfig,

    pub identity: IdentityConfig,

    pub auth: AuthConfig,

    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadError` when a required variable is missing
    /// or a value cannot be parsed into its field type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("MEMBERSHIP_ENGINE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic validation of every section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let environment = self.server.environment;
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(&environment)?;
        self.identity.validate(&environment)?;
        self.auth.validate()?;
        self.lifecycle.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
