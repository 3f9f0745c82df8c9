//! PostgreSQL implementation of CouponStore.

use async_trait::async_trait;
use sqlx::PgPool;

use super::query_failed;
use crate::domain::foundation::DomainError;
use crate::domain::membership::{Coupon, CouponKind};
use crate::ports::CouponStore;

pub struct PostgresCouponStore {
    pool: PgPool,
}

impl PostgresCouponStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    code: String,
    kind: String,
    value: i64,
    active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DomainError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "percentage" => CouponKind::Percentage {
                basis_points: u32::try_from(row.value).map_err(|_| {
                    DomainError::database(format!("Invalid basis points: {}", row.value))
                })?,
            },
            "fixed_amount" => CouponKind::FixedAmount { amount: row.value },
            other => {
                return Err(DomainError::database(format!(
                    "Invalid coupon kind value: {}",
                    other
                )))
            }
        };
        Ok(Coupon {
            code: row.code,
            kind,
            active: row.active,
        })
    }
}

#[async_trait]
impl CouponStore for PostgresCouponStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        let row: Option<CouponRow> = sqlx::query_as(
            "SELECT code, kind, value, active FROM coupons WHERE code = $1",
        )
        .bind(Coupon::normalize_code(code))
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find coupon"))?;

        row.map(Coupon::try_from).transpose()
    }
}
