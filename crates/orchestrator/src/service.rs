//! Application service behind the API surface: registers tenants, requests
//! deletion and retries, and reads lifecycle state. All long-running work is
//! dispatched to the workers; nothing here blocks on provisioning.

use std::sync::Arc;

use tenantd_domain::{
    ExecutionLedgerRepository, NewTenant, QueueRoute, SchemaName, Tenant, TenantRepository,
    TenantStatus, WorkflowDispatcher, WorkflowExecution, WorkflowMessage, WorkflowType,
};
use tenantd_errors::{TenantError, TenantResult};
use tenantd_infrastructure::QueueRouter;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct TenantService {
    tenants: Arc<dyn TenantRepository>,
    ledger: Arc<dyn ExecutionLedgerRepository>,
    dispatcher: Arc<dyn WorkflowDispatcher>,
    router: Arc<QueueRouter>,
}

impl TenantService {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        ledger: Arc<dyn ExecutionLedgerRepository>,
        dispatcher: Arc<dyn WorkflowDispatcher>,
        router: Arc<QueueRouter>,
    ) -> Self {
        Self {
            tenants,
            ledger,
            dispatcher,
            router,
        }
    }

    /// Registers a tenant and dispatches its provisioning run.
    ///
    /// The registry row commits in `Provisioning` before dispatch, so a
    /// dispatch failure can never lose the tenant: the row stays visible in
    /// `Provisioning` and the sweeper re-dispatches it.
    #[instrument(skip(self))]
    pub async fn register_tenant(
        &self,
        name: &str,
        raw_slug: &str,
        owner_user_id: Uuid,
    ) -> TenantResult<Tenant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TenantError::validation_error("tenant name must not be empty"));
        }
        let schema_name = SchemaName::parse(raw_slug)?;

        let tenant = self
            .tenants
            .create_in_provisioning(&NewTenant {
                id: Uuid::new_v4(),
                name: name.to_string(),
                slug: schema_name.slug().to_string(),
                schema_name: schema_name.schema_name(),
                owner_user_id,
            })
            .await?;

        info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant registered");
        self.enqueue_workflow(tenant.id, WorkflowType::TenantProvisioning)
            .await?;
        Ok(tenant)
    }

    /// Requests deprovisioning. Deletion during `Provisioning` is rejected
    /// outright; the saga in flight would race the teardown.
    #[instrument(skip(self))]
    pub async fn request_deletion(&self, tenant_id: Uuid) -> TenantResult<WorkflowExecution> {
        let tenant = self.get_status(tenant_id).await?;
        match tenant.status {
            TenantStatus::Ready | TenantStatus::Failed => {}
            other => {
                return Err(TenantError::invalid_transition(
                    other.as_str(),
                    TenantStatus::Deleting.as_str(),
                ));
            }
        }
        self.enqueue_workflow(tenant_id, WorkflowType::TenantDeprovisioning)
            .await
    }

    /// Re-runs provisioning for a `Failed` tenant. The `Failed ->
    /// Provisioning` transition goes through the guarded choke point, so a
    /// concurrent retry loses cleanly instead of double-dispatching.
    #[instrument(skip(self))]
    pub async fn retry_provisioning(&self, tenant_id: Uuid) -> TenantResult<WorkflowExecution> {
        let tenant = self.get_status(tenant_id).await?;
        if tenant.status != TenantStatus::Failed {
            return Err(TenantError::invalid_transition(
                tenant.status.as_str(),
                TenantStatus::Provisioning.as_str(),
            ));
        }
        self.tenants
            .update_status(tenant_id, TenantStatus::Provisioning)
            .await?;
        self.enqueue_workflow(tenant_id, WorkflowType::TenantProvisioning)
            .await
    }

    pub async fn get_status(&self, tenant_id: Uuid) -> TenantResult<Tenant> {
        self.tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or(TenantError::TenantNotFound { id: tenant_id })
    }

    pub async fn list_executions(&self, tenant_id: Uuid) -> TenantResult<Vec<WorkflowExecution>> {
        // 404 for unknown tenants instead of an empty history
        self.get_status(tenant_id).await?;
        self.ledger.list_for_tenant(tenant_id).await
    }

    /// Creates the `Pending` ledger row, then dispatches. A dispatch
    /// failure is logged and swallowed: the ledger row plus the tenant's
    /// non-terminal status are exactly what the sweeper scans for.
    async fn enqueue_workflow(
        &self,
        tenant_id: Uuid,
        workflow: WorkflowType,
    ) -> TenantResult<WorkflowExecution> {
        let run_id = Uuid::new_v4().to_string();
        let execution = self
            .ledger
            .create_pending(&WorkflowExecution::new_pending(
                run_id.clone(),
                workflow,
                tenant_id,
            ))
            .await?;

        let route = self.router.route(tenant_id, workflow.workload_kind());
        let message = WorkflowMessage::new(run_id.clone(), workflow, tenant_id);
        if let Err(e) = self.dispatch(&message, &route).await {
            warn!(
                run_id,
                %tenant_id,
                %workflow,
                queue = %route.queue_name,
                "dispatch failed, leaving run for the sweeper: {e}"
            );
        } else {
            info!(run_id, %tenant_id, %workflow, queue = %route.queue_name, "workflow dispatched");
        }
        Ok(execution)
    }

    async fn dispatch(&self, message: &WorkflowMessage, route: &QueueRoute) -> TenantResult<()> {
        self.dispatcher.dispatch(message, route).await
    }
}
