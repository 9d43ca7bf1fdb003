use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tenantd_domain::{MembershipRepository, TenantMembership};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::pg_errors::{self, PgViolation};

const MEMBERSHIP_COLUMNS: &str = "id, user_id, tenant_id, role, created_at";

pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_membership(row: &sqlx::postgres::PgRow) -> TenantResult<TenantMembership> {
        Ok(TenantMembership {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            tenant_id: row.try_get("tenant_id")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    /// A duplicate on `(user_id, tenant_id)` means a retry raced a
    /// concurrent first attempt — `Ok(None)`, the row exists. A FK
    /// violation means user or tenant is absent — fatal, never retried.
    /// Which case applies is decided by the constraint that fired.
    #[instrument(skip(self))]
    async fn create_seed(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: &str,
    ) -> TenantResult<Option<TenantMembership>> {
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO tenant_memberships (user_id, tenant_id, role)
            VALUES ($1, $2, $3)
            RETURNING {MEMBERSHIP_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(tenant_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let membership = Self::row_to_membership(&row)?;
                debug!(%user_id, %tenant_id, "seed membership created");
                Ok(Some(membership))
            }
            Err(e) => match pg_errors::violation(&e) {
                Some(PgViolation::Unique(constraint))
                    if constraint == "uq_tenant_memberships_user_tenant" =>
                {
                    debug!(%user_id, %tenant_id, "seed membership already exists");
                    Ok(None)
                }
                Some(PgViolation::ForeignKey(constraint)) => {
                    Err(TenantError::ForeignKeyViolation { constraint })
                }
                _ => Err(e.into()),
            },
        }
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> TenantResult<Option<TenantMembership>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM tenant_memberships \
             WHERE user_id = $1 AND tenant_id = $2"
        ))
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_membership).transpose()
    }

    #[instrument(skip(self))]
    async fn remove(&self, user_id: Uuid, tenant_id: Uuid) -> TenantResult<()> {
        sqlx::query("DELETE FROM tenant_memberships WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
