//! Session validation port for access tokens.
//!
//! HTTP middleware hands the raw Bearer token to a `SessionValidator` and
//! attaches the resulting [`AuthenticatedUser`] to the request. Guests
//! carry no token and never reach intent-mutating handlers.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

/// Validates access tokens and extracts user identity.
///
/// Implementations must check signature, issuer, and expiry, returning
/// `AuthError::TokenExpired` for expired tokens and
/// `AuthError::InvalidToken` for everything else that fails.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validate a token (without the "Bearer " prefix).
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_validator_is_object_safe() {
        fn _accepts_dyn(_validator: &dyn SessionValidator) {}
    }
}
