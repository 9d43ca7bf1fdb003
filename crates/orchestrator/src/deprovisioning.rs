use std::sync::Arc;

use tenantd_domain::{TenantStatus, WorkflowType};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::activities::TenantActivities;
use crate::retry::RetryPolicy;

/// Deprovisioning runs as a forward-only sequence, not a compensated saga:
/// once the tenant is fenced off in `Deleting` there is nothing to roll
/// back to. A failure leaves the tenant in `Deleting` for the sweeper to
/// re-drive; every step is idempotent under replay.
pub struct DeprovisioningOrchestrator {
    activities: Arc<TenantActivities>,
    retry: RetryPolicy,
}

impl DeprovisioningOrchestrator {
    pub fn new(activities: Arc<TenantActivities>, retry: RetryPolicy) -> Self {
        Self { activities, retry }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, run_id: &str, tenant_id: Uuid) -> TenantResult<()> {
        self.retry
            .execute("update_execution_ledger", || {
                self.activities
                    .mark_running(run_id, WorkflowType::TenantDeprovisioning, tenant_id)
            })
            .await?;

        match self.drive(run_id, tenant_id).await {
            Ok(()) => {
                info!(run_id, %tenant_id, "tenant deprovisioned");
                Ok(())
            }
            Err(e) => {
                self.fail_run(run_id, tenant_id, &e).await;
                Err(e)
            }
        }
    }

    async fn drive(&self, run_id: &str, tenant_id: Uuid) -> TenantResult<()> {
        let (tenant, schema_name) = self
            .retry
            .execute("get_tenant_info", || {
                self.activities.get_tenant_info(tenant_id)
            })
            .await?;

        // A replayed run may find the work already finished.
        if tenant.status == TenantStatus::Deleted {
            warn!(run_id, %tenant_id, "tenant already deleted, completing replayed run");
            return self
                .retry
                .execute("update_execution_ledger", || {
                    self.activities.mark_completed(run_id)
                })
                .await;
        }

        // Fence the tenant off before touching its schema so no session can
        // be scoped into a schema that is about to disappear.
        self.retry
            .execute("update_status", || {
                self.activities
                    .update_status(tenant_id, TenantStatus::Deleting)
            })
            .await?;

        self.retry
            .execute("drop_schema", || {
                self.activities.drop_schema(&schema_name)
            })
            .await?;

        self.retry
            .execute("update_status", || {
                self.activities
                    .update_status(tenant_id, TenantStatus::Deleted)
            })
            .await?;

        self.retry
            .execute("update_execution_ledger", || {
                self.activities.mark_completed(run_id)
            })
            .await
    }

    /// Terminal ledger write only. The tenant deliberately stays in
    /// `Deleting` so the sweeper can re-dispatch the run.
    async fn fail_run(&self, run_id: &str, tenant_id: Uuid, cause: &TenantError) {
        let cause = cause.to_string();
        if let Err(e) = self
            .retry
            .execute("update_execution_ledger", || {
                self.activities.mark_failed(run_id, &cause)
            })
            .await
        {
            error!(run_id, %tenant_id, "failed to record run failure: {e}");
        }
    }
}
