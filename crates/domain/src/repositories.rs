//! Repository ports for the tenant registry, execution ledger and
//! memberships. Implementations live in the infrastructure crate; tests use
//! the in-memory mocks from `tenantd-testing-utils`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenantd_errors::TenantResult;
use uuid::Uuid;

use crate::entities::{Tenant, TenantMembership, TenantStatus, WorkflowExecution, WorkflowType};

/// New-tenant payload for the registration path.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub schema_name: String,
    pub owner_user_id: Uuid,
}

/// Tenant registry port. `update_status` is the single choke point through
/// which status changes flow, so `status` and `is_active` can never disagree.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Inserts the registry row in `Provisioning` state and commits it.
    /// A normalized-slug collision surfaces as `SlugConflict`.
    async fn create_in_provisioning(&self, tenant: &NewTenant) -> TenantResult<Tenant>;

    async fn find_by_id(&self, id: Uuid) -> TenantResult<Option<Tenant>>;

    async fn find_by_schema_name(&self, schema_name: &str) -> TenantResult<Option<Tenant>>;

    /// Guarded status transition validated against the state machine table.
    /// Computes `is_active` and `deleted_at` in the same write. Returns the
    /// updated row.
    async fn update_status(&self, id: Uuid, new_status: TenantStatus) -> TenantResult<Tenant>;

    /// Tenants stuck in `Provisioning` since before `cutoff` that have no
    /// running or completed provisioning ledger row.
    async fn find_stuck_provisioning(&self, cutoff: DateTime<Utc>) -> TenantResult<Vec<Tenant>>;
}

/// Execution ledger port. Owned exclusively by the orchestration subsystem.
#[async_trait]
pub trait ExecutionLedgerRepository: Send + Sync {
    /// Creates the `Pending` row before a run is dispatched. The run id
    /// carries a true uniqueness constraint.
    async fn create_pending(&self, execution: &WorkflowExecution) -> TenantResult<WorkflowExecution>;

    /// `Pending -> Running` on orchestrator entry. Creates the row if the
    /// run was re-dispatched by the sweeper with a fresh id.
    async fn mark_running(
        &self,
        run_id: &str,
        workflow: WorkflowType,
        tenant_id: Uuid,
    ) -> TenantResult<()>;

    /// Terminal completion. Writing the same terminal state twice is a no-op.
    async fn mark_completed(&self, run_id: &str) -> TenantResult<()>;

    /// Terminal failure with the causing error. Idempotent like
    /// `mark_completed`.
    async fn mark_failed(&self, run_id: &str, error: &str) -> TenantResult<()>;

    async fn find_by_run_id(&self, run_id: &str) -> TenantResult<Option<WorkflowExecution>>;

    /// Run history for operational tooling.
    async fn list_for_tenant(&self, tenant_id: Uuid) -> TenantResult<Vec<WorkflowExecution>>;

    /// Whether the tenant has any provisioning run currently `Running` or
    /// already `Completed` (used by the sweeper's stuck-tenant scan).
    async fn has_live_provisioning_run(&self, tenant_id: Uuid) -> TenantResult<bool>;

    /// Ledger rows stuck in `Running` since before `cutoff`.
    async fn find_stale_running(&self, cutoff: DateTime<Utc>)
        -> TenantResult<Vec<WorkflowExecution>>;
}

/// Membership port used by the seed-membership activity and its
/// compensation.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Inserts the seed membership. A duplicate on `(user_id, tenant_id)`
    /// must be reported as `SlugConflict`-style success by the caller, so
    /// the implementation surfaces constraint identity faithfully:
    /// returns `Ok(None)` when the row already existed, `Ok(Some(_))` when
    /// inserted, and a `ForeignKeyViolation` when user or tenant is absent.
    async fn create_seed(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: &str,
    ) -> TenantResult<Option<TenantMembership>>;

    async fn find(&self, user_id: Uuid, tenant_id: Uuid)
        -> TenantResult<Option<TenantMembership>>;

    /// Compensation for `create_seed`; removing an absent row is a no-op.
    async fn remove(&self, user_id: Uuid, tenant_id: Uuid) -> TenantResult<()>;
}
