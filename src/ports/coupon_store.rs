//! CouponStore port.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::membership::Coupon;

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Look up a coupon by normalized (uppercase) code.
    ///
    /// Inactive coupons are returned; callers decide what inactive means.
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError>;
}
