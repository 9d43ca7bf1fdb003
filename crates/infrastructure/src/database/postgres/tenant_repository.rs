use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tenantd_domain::{NewTenant, Tenant, TenantRepository, TenantStatus};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::pg_errors;

const TENANT_COLUMNS: &str = "id, name, slug, schema_name, status, is_active, owner_user_id, \
                              deleted_at, created_at, updated_at";

pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_tenant(row: &sqlx::postgres::PgRow) -> TenantResult<Tenant> {
        Ok(Tenant {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            schema_name: row.try_get("schema_name")?,
            status: row.try_get("status")?,
            is_active: row.try_get("is_active")?,
            owner_user_id: row.try_get("owner_user_id")?,
            deleted_at: row.try_get("deleted_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id, schema_name = %tenant.schema_name))]
    async fn create_in_provisioning(&self, tenant: &NewTenant) -> TenantResult<Tenant> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tenants (id, name, slug, schema_name, status, is_active, owner_user_id)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            RETURNING {TENANT_COLUMNS}
            "#,
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(&tenant.schema_name)
        .bind(TenantStatus::Provisioning)
        .bind(tenant.owner_user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if pg_errors::is_unique_violation_on(&e, "uq_tenants_schema_name") {
                TenantError::SlugConflict {
                    schema_name: tenant.schema_name.clone(),
                }
            } else if matches!(
                pg_errors::violation(&e),
                Some(pg_errors::PgViolation::ForeignKey(_))
            ) {
                TenantError::UserNotFound {
                    id: tenant.owner_user_id,
                }
            } else {
                e.into()
            }
        })?;

        let created = Self::row_to_tenant(&row)?;
        debug!(tenant_id = %created.id, "tenant registered in provisioning state");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> TenantResult<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_schema_name(&self, schema_name: &str) -> TenantResult<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE schema_name = $1"
        ))
        .bind(schema_name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    /// The single choke point for status changes. Validates against the
    /// transition table, then applies status, `is_active` and `deleted_at`
    /// in one guarded UPDATE so they can never disagree.
    #[instrument(skip(self), fields(new_status = %new_status))]
    async fn update_status(&self, id: Uuid, new_status: TenantStatus) -> TenantResult<Tenant> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or(TenantError::TenantNotFound { id })?;

        current.status.validate_transition(new_status)?;
        if current.status == new_status {
            // idempotent re-application
            return Ok(current);
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE tenants
            SET status = $1,
                is_active = $2,
                deleted_at = CASE WHEN $1 = 'DELETED' THEN COALESCE(deleted_at, now())
                                  ELSE deleted_at END,
                updated_at = now()
            WHERE id = $3 AND status = $4
            RETURNING {TENANT_COLUMNS}
            "#,
        ))
        .bind(new_status)
        .bind(new_status.is_active())
        .bind(id)
        .bind(current.status)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let updated = Self::row_to_tenant(&row)?;
                debug!(from = %current.status, to = %new_status, "tenant status transitioned");
                Ok(updated)
            }
            // someone else won the transition race; retryable so the
            // activity re-reads current state on the next attempt
            None => Err(TenantError::TransitionConflict {
                id,
                expected: current.status.as_str().to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn find_stuck_provisioning(&self, cutoff: DateTime<Utc>) -> TenantResult<Vec<Tenant>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TENANT_COLUMNS}
            FROM tenants t
            WHERE t.status = 'PROVISIONING'
              AND t.updated_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM workflow_executions e
                  WHERE e.tenant_id = t.id
                    AND e.workflow = 'TENANT_PROVISIONING'
                    AND e.status IN ('RUNNING', 'COMPLETED')
              )
            ORDER BY t.updated_at
            "#,
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_tenant).collect()
    }
}
