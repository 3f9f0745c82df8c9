//! PostgreSQL implementation of ProfileRepository.
//!
//! Profiles are owned by the wider application; the engine reads them and
//! writes only the billing customer handle, identity flag, and membership
//! projection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{parse_column, parse_user_id, query_failed};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::membership::{MemberProfile, MembershipStatus, MembershipType, PostalAddress};
use crate::ports::ProfileRepository;

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: String,
    legal_name: Option<String>,
    contact_phone: Option<String>,
    address_line1: Option<String>,
    address_line2: Option<String>,
    address_city: Option<String>,
    address_postal_code: Option<String>,
    address_country: Option<String>,
    identity_verified: bool,
    identity_verified_at: Option<DateTime<Utc>>,
    membership_status: Option<String>,
    membership_type: Option<String>,
    billing_customer_id: Option<String>,
}

impl TryFrom<ProfileRow> for MemberProfile {
    type Error = DomainError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let address = row.address_line1.map(|line1| PostalAddress {
            line1,
            line2: row.address_line2,
            city: row.address_city.unwrap_or_default(),
            postal_code: row.address_postal_code.unwrap_or_default(),
            country: row.address_country.unwrap_or_default(),
        });

        Ok(MemberProfile {
            user_id: parse_user_id(row.user_id)?,
            legal_name: row.legal_name,
            contact_phone: row.contact_phone,
            address,
            identity_verified: row.identity_verified,
            identity_verified_at: row.identity_verified_at.map(Timestamp::from_datetime),
            membership_status: row
                .membership_status
                .as_deref()
                .map(|s| parse_column("membership_status", s))
                .transpose()?,
            membership_type: row
                .membership_type
                .as_deref()
                .map(|s| parse_column("membership_type", s))
                .transpose()?,
            billing_customer_id: row.billing_customer_id,
        })
    }
}

fn profile_not_found(user_id: &UserId) -> DomainError {
    DomainError::new(ErrorCode::ProfileNotFound, "profile not found")
        .with_detail("user_id", user_id.as_str())
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<MemberProfile>, DomainError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT user_id, legal_name, contact_phone, address_line1, address_line2,
                   address_city, address_postal_code, address_country, identity_verified,
                   identity_verified_at, membership_status, membership_type, billing_customer_id
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find profile"))?;

        row.map(MemberProfile::try_from).transpose()
    }

    async fn set_billing_customer_if_absent(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<String, DomainError> {
        // COALESCE keeps the first writer's handle under concurrent checkouts
        let stored: Option<Option<String>> = sqlx::query_scalar(
            r#"
            UPDATE profiles
            SET billing_customer_id = COALESCE(billing_customer_id, $2), updated_at = NOW()
            WHERE user_id = $1
            RETURNING billing_customer_id
            "#,
        )
        .bind(user_id.as_str())
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("set billing customer"))?;

        match stored {
            Some(Some(id)) => Ok(id),
            Some(None) => Ok(customer_id.to_string()),
            None => Err(profile_not_found(user_id)),
        }
    }

    async fn mark_identity_verified(
        &self,
        user_id: &UserId,
        at: Timestamp,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET identity_verified = TRUE,
                identity_verified_at = COALESCE(identity_verified_at, $2),
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(query_failed("mark identity verified"))?;

        if result.rows_affected() == 0 {
            return Err(profile_not_found(user_id));
        }
        Ok(())
    }

    async fn update_membership_projection(
        &self,
        user_id: &UserId,
        status: MembershipStatus,
        membership_type: MembershipType,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET membership_status = $2, membership_type = $3, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .bind(status.as_str())
        .bind(membership_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_failed("update membership projection"))?;

        if result.rows_affected() == 0 {
            return Err(profile_not_found(user_id));
        }
        Ok(())
    }
}
