//! In-memory coupon store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::membership::Coupon;
use crate::ports::CouponStore;

#[derive(Default)]
pub struct InMemoryCouponStore {
    coupons: RwLock<HashMap<String, Coupon>>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a coupon, normalizing its code.
    pub async fn put(&self, mut coupon: Coupon) {
        coupon.code = Coupon::normalize_code(&coupon.code);
        self.coupons.write().await.insert(coupon.code.clone(), coupon);
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        Ok(self
            .coupons
            .read()
            .await
            .get(&Coupon::normalize_code(code))
            .cloned())
    }
}
