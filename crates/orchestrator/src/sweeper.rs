//! Reconciliation sweeper: the safety net for runs lost to crashes or
//! dispatch failures. Scans the registry and ledger on an interval and
//! re-dispatches abandoned work under fresh run ids.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tenantd_domain::{
    ExecutionLedgerRepository, Tenant, TenantRepository, WorkflowDispatcher, WorkflowExecution,
    WorkflowMessage, WorkflowType,
};
use tenantd_errors::TenantResult;
use tenantd_infrastructure::QueueRouter;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// How long a tenant may sit in `Provisioning` with no live run before
    /// the sweeper re-dispatches it.
    pub provisioning_grace: Duration,
    /// How long a ledger row may stay `Running` before it is presumed
    /// abandoned.
    pub running_staleness: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            provisioning_grace: Duration::from_secs(300),
            running_staleness: Duration::from_secs(900),
        }
    }
}

/// What one sweep pass found and re-dispatched, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stuck_tenants: usize,
    pub stale_runs: usize,
}

pub struct Sweeper {
    tenants: Arc<dyn TenantRepository>,
    ledger: Arc<dyn ExecutionLedgerRepository>,
    dispatcher: Arc<dyn WorkflowDispatcher>,
    router: Arc<QueueRouter>,
    config: SweeperConfig,
}

impl Sweeper {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        ledger: Arc<dyn ExecutionLedgerRepository>,
        dispatcher: Arc<dyn WorkflowDispatcher>,
        router: Arc<QueueRouter>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            tenants,
            ledger,
            dispatcher,
            router,
            config,
        }
    }

    /// Sweeps on the configured interval until shutdown is signalled.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> TenantResult<()> {
        let mut interval = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("sweeper shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.stuck_tenants + report.stale_runs > 0 => {
                            info!(
                                stuck_tenants = report.stuck_tenants,
                                stale_runs = report.stale_runs,
                                "sweep re-dispatched abandoned work"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!("sweep pass failed: {e}"),
                    }
                }
            }
        }
    }

    /// One reconciliation pass.
    ///
    /// The two scans are disjoint by construction: a tenant with a stale
    /// `Running` provisioning row is excluded from the stuck-tenant scan,
    /// so a single pass never dispatches the same tenant twice.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> TenantResult<SweepReport> {
        let mut report = SweepReport::default();

        let stuck_cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.provisioning_grace)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));
        for tenant in self.tenants.find_stuck_provisioning(stuck_cutoff).await? {
            if self.redispatch_tenant(&tenant).await {
                report.stuck_tenants += 1;
            }
        }

        let stale_cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.running_staleness)
                .unwrap_or_else(|_| chrono::Duration::seconds(900));
        for execution in self.ledger.find_stale_running(stale_cutoff).await? {
            if self.redispatch_stale_run(&execution).await {
                report.stale_runs += 1;
            }
        }

        Ok(report)
    }

    async fn redispatch_tenant(&self, tenant: &Tenant) -> bool {
        warn!(
            tenant_id = %tenant.id,
            slug = %tenant.slug,
            "tenant stuck in provisioning with no live run, re-dispatching"
        );
        match self
            .dispatch_fresh(tenant.id, WorkflowType::TenantProvisioning)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(tenant_id = %tenant.id, "re-dispatch failed: {e}");
                false
            }
        }
    }

    /// Fails the abandoned run in the ledger, then re-dispatches the same
    /// workflow under a fresh run id. Failing first keeps the next sweep
    /// pass from picking the old row up again.
    async fn redispatch_stale_run(&self, execution: &WorkflowExecution) -> bool {
        // terminal tenants get no further work
        let tenant = match self.tenants.find_by_id(execution.tenant_id).await {
            Ok(Some(t)) if !t.status.is_terminal() => t,
            Ok(_) => return false,
            Err(e) => {
                error!(run_id = %execution.run_id, "tenant lookup failed during sweep: {e}");
                return false;
            }
        };
        warn!(
            run_id = %execution.run_id,
            tenant_id = %tenant.id,
            workflow = %execution.workflow,
            "abandoned run, failing it and re-dispatching"
        );
        if let Err(e) = self
            .ledger
            .mark_failed(&execution.run_id, "abandoned; superseded by sweeper re-dispatch")
            .await
        {
            error!(run_id = %execution.run_id, "failed to fail abandoned run: {e}");
            return false;
        }
        match self.dispatch_fresh(tenant.id, execution.workflow).await {
            Ok(()) => true,
            Err(e) => {
                error!(tenant_id = %tenant.id, "re-dispatch failed: {e}");
                false
            }
        }
    }

    async fn dispatch_fresh(&self, tenant_id: Uuid, workflow: WorkflowType) -> TenantResult<()> {
        let run_id = Uuid::new_v4().to_string();
        self.ledger
            .create_pending(&WorkflowExecution::new_pending(
                run_id.clone(),
                workflow,
                tenant_id,
            ))
            .await?;
        let route = self.router.route(tenant_id, workflow.workload_kind());
        let message = WorkflowMessage::new(run_id, workflow, tenant_id);
        self.dispatcher.dispatch(&message, &route).await
    }
}
