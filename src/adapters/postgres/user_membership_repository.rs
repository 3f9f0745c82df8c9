//! PostgreSQL implementation of UserMembershipRepository.
//!
//! One row per user. The processor subscription id is unique so a
//! subscription can never back two memberships.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{parse_column, parse_user_id, query_failed};
use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::membership::UserMembership;
use crate::ports::UserMembershipRepository;

pub struct PostgresUserMembershipRepository {
    pool: PgPool,
}

impl PostgresUserMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a membership.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    user_id: String,
    external_subscription_id: Option<String>,
    membership_type: String,
    status: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for UserMembership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(UserMembership {
            user_id: parse_user_id(row.user_id)?,
            external_subscription_id: row.external_subscription_id,
            membership_type: parse_column("membership_type", &row.membership_type)?,
            status: parse_column("status", &row.status)?,
            period_start: Timestamp::from_datetime(row.period_start),
            period_end: Timestamp::from_datetime(row.period_end),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl UserMembershipRepository for PostgresUserMembershipRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserMembership>, DomainError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT user_id, external_subscription_id, membership_type, status,
                   period_start, period_end, updated_at
            FROM user_memberships
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find membership"))?;

        row.map(UserMembership::try_from).transpose()
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<UserMembership>, DomainError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT user_id, external_subscription_id, membership_type, status,
                   period_start, period_end, updated_at
            FROM user_memberships
            WHERE external_subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("find membership by subscription"))?;

        row.map(UserMembership::try_from).transpose()
    }

    async fn upsert(&self, membership: &UserMembership) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_memberships (
                user_id, external_subscription_id, membership_type, status,
                period_start, period_end, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                external_subscription_id = EXCLUDED.external_subscription_id,
                membership_type = EXCLUDED.membership_type,
                status = EXCLUDED.status,
                period_start = EXCLUDED.period_start,
                period_end = EXCLUDED.period_end,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(membership.user_id.as_str())
        .bind(&membership.external_subscription_id)
        .bind(membership.membership_type.as_str())
        .bind(membership.status.as_str())
        .bind(membership.period_start.as_datetime())
        .bind(membership.period_end.as_datetime())
        .bind(membership.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(query_failed("upsert membership"))?;

        Ok(())
    }
}
