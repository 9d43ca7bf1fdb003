//! The idempotent activity contracts the orchestrators invoke.
//!
//! Every method is safe to execute more than once with identical inputs —
//! the execution substrate retries on ambiguous failures, and a sweeper may
//! re-drive an entire run.

use std::sync::Arc;

use tenantd_domain::{
    ExecutionLedgerRepository, MembershipRepository, Notifier, SchemaManager, SchemaName, Tenant,
    TenantRepository, TenantStatus, WorkflowType,
};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{debug, instrument};
use uuid::Uuid;

pub const SEED_MEMBERSHIP_ROLE: &str = "admin";

pub struct TenantActivities {
    tenants: Arc<dyn TenantRepository>,
    memberships: Arc<dyn MembershipRepository>,
    ledger: Arc<dyn ExecutionLedgerRepository>,
    schemas: Arc<dyn SchemaManager>,
    notifier: Arc<dyn Notifier>,
}

impl TenantActivities {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        memberships: Arc<dyn MembershipRepository>,
        ledger: Arc<dyn ExecutionLedgerRepository>,
        schemas: Arc<dyn SchemaManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tenants,
            memberships,
            ledger,
            schemas,
            notifier,
        }
    }

    /// Loads the tenant row and re-derives its schema name from the stored
    /// slug. Validation runs here on every invocation — a previously
    /// validated value is never trusted across a dispatch or replay
    /// boundary.
    #[instrument(skip(self))]
    pub async fn get_tenant_info(&self, tenant_id: Uuid) -> TenantResult<(Tenant, SchemaName)> {
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or(TenantError::TenantNotFound { id: tenant_id })?;
        let schema_name = SchemaName::parse(&tenant.slug)?;
        Ok((tenant, schema_name))
    }

    pub async fn create_schema(&self, name: &SchemaName) -> TenantResult<()> {
        self.schemas.create_schema(name).await
    }

    pub async fn run_migrations(&self, name: &SchemaName) -> TenantResult<()> {
        self.schemas.run_migrations(name).await
    }

    pub async fn drop_schema(&self, name: &SchemaName) -> TenantResult<()> {
        self.schemas.drop_schema(name).await
    }

    /// Seeds the owner's admin membership. An existing `(user, tenant)` row
    /// means a retry raced an earlier attempt — success either way.
    #[instrument(skip(self))]
    pub async fn create_seed_membership(&self, user_id: Uuid, tenant_id: Uuid) -> TenantResult<()> {
        match self
            .memberships
            .create_seed(user_id, tenant_id, SEED_MEMBERSHIP_ROLE)
            .await?
        {
            Some(_) => debug!(%user_id, %tenant_id, "seed membership created"),
            None => debug!(%user_id, %tenant_id, "seed membership already present"),
        }
        Ok(())
    }

    pub async fn remove_seed_membership(&self, user_id: Uuid, tenant_id: Uuid) -> TenantResult<()> {
        self.memberships.remove(user_id, tenant_id).await
    }

    pub async fn send_welcome_notification(&self, tenant: &Tenant) -> TenantResult<()> {
        self.notifier
            .send_welcome(tenant.id, &tenant.name)
            .await
            .map_err(|e| TenantError::Notification(e.to_string()))
    }

    /// Guarded status transition through the registry's choke point.
    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        new_status: TenantStatus,
    ) -> TenantResult<Tenant> {
        self.tenants.update_status(tenant_id, new_status).await
    }

    pub async fn mark_running(
        &self,
        run_id: &str,
        workflow: WorkflowType,
        tenant_id: Uuid,
    ) -> TenantResult<()> {
        self.ledger.mark_running(run_id, workflow, tenant_id).await
    }

    pub async fn mark_completed(&self, run_id: &str) -> TenantResult<()> {
        self.ledger.mark_completed(run_id).await
    }

    pub async fn mark_failed(&self, run_id: &str, error: &str) -> TenantResult<()> {
        self.ledger.mark_failed(run_id, error).await
    }
}
