use std::sync::{Arc, Mutex};

use tenantd_domain::{SchemaName, Tenant, TenantStatus, WorkflowType};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::activities::TenantActivities;
use crate::retry::RetryPolicy;
use crate::saga::{step_fn, Saga, SagaStep};

/// Shared state of one provisioning run. Steps may execute with arbitrary
/// delay between them; everything they need is re-derived from the registry
/// in `get_tenant_info`, never carried across the dispatch boundary.
pub struct ProvisioningContext {
    activities: Arc<TenantActivities>,
    retry: RetryPolicy,
    run_id: String,
    tenant_id: Uuid,
    loaded: Mutex<Option<(Tenant, SchemaName)>>,
}

impl ProvisioningContext {
    fn store(&self, tenant: Tenant, schema_name: SchemaName) {
        *self.loaded.lock().unwrap() = Some((tenant, schema_name));
    }

    fn tenant(&self) -> TenantResult<Tenant> {
        self.loaded
            .lock()
            .unwrap()
            .as_ref()
            .map(|(t, _)| t.clone())
            .ok_or_else(|| TenantError::Internal("tenant info not loaded".into()))
    }

    fn schema_name(&self) -> TenantResult<SchemaName> {
        self.loaded
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, n)| n.clone())
            .ok_or_else(|| TenantError::Internal("tenant info not loaded".into()))
    }
}

/// Provisioning saga: schema creation, migration, seed membership,
/// best-effort welcome notification, `Ready` transition, ledger completion.
/// Any hard failure before the `Ready` transition triggers the compensation
/// pass (schema dropped, seed membership removed) and ends in `Failed`.
pub struct ProvisioningOrchestrator {
    activities: Arc<TenantActivities>,
    retry: RetryPolicy,
}

impl ProvisioningOrchestrator {
    pub fn new(activities: Arc<TenantActivities>, retry: RetryPolicy) -> Self {
        Self { activities, retry }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, run_id: &str, tenant_id: Uuid) -> TenantResult<()> {
        self.retry
            .execute("update_execution_ledger", || {
                self.activities
                    .mark_running(run_id, WorkflowType::TenantProvisioning, tenant_id)
            })
            .await?;

        let ctx = Arc::new(ProvisioningContext {
            activities: Arc::clone(&self.activities),
            retry: self.retry.clone(),
            run_id: run_id.to_string(),
            tenant_id,
            loaded: Mutex::new(None),
        });

        match Self::saga().execute(&ctx).await {
            Ok(()) => {
                info!(run_id, %tenant_id, "tenant provisioned");
                Ok(())
            }
            Err(e) => {
                self.fail_run(run_id, tenant_id, &e).await;
                Err(e)
            }
        }
    }

    /// Failure epilogue after the compensation pass: terminal `Failed`
    /// status, then the terminal ledger write. Epilogue errors are logged,
    /// never allowed to mask the causing error.
    async fn fail_run(&self, run_id: &str, tenant_id: Uuid, cause: &TenantError) {
        if let Err(e) = self
            .retry
            .execute("update_status", || {
                self.activities
                    .update_status(tenant_id, TenantStatus::Failed)
            })
            .await
        {
            error!(run_id, %tenant_id, "failed to mark tenant failed: {e}");
        }
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

    fn saga() -> Saga<ProvisioningContext> {
        Saga::new("tenant_provisioning")
            .step(SagaStep::new(
                "get_tenant_info",
                step_fn(|ctx: Arc<ProvisioningContext>| {
                    Box::pin(async move {
                        let (tenant, schema_name) = ctx
                            .retry
                            .execute("get_tenant_info", || {
                                ctx.activities.get_tenant_info(ctx.tenant_id)
                            })
                            .await?;
                        ctx.store(tenant, schema_name);
                        Ok(())
                    })
                }),
            ))
            .step(
                SagaStep::new(
                    "create_schema",
                    step_fn(|ctx: Arc<ProvisioningContext>| {
                        Box::pin(async move {
                            let name = ctx.schema_name()?;
                            ctx.retry
                                .execute("create_schema", || ctx.activities.create_schema(&name))
                                .await
                        })
                    }),
                )
                .with_compensation(step_fn(|ctx: Arc<ProvisioningContext>| {
                    Box::pin(async move {
                        let name = ctx.schema_name()?;
                        ctx.retry
                            .execute("drop_schema", || ctx.activities.drop_schema(&name))
                            .await
                    })
                })),
            )
            .step(SagaStep::new(
                "run_migrations",
                step_fn(|ctx: Arc<ProvisioningContext>| {
                    Box::pin(async move {
                        let name = ctx.schema_name()?;
                        ctx.retry
                            .execute("run_migrations", || ctx.activities.run_migrations(&name))
                            .await
                    })
                }),
            ))
            .step(
                SagaStep::new(
                    "create_seed_membership",
                    step_fn(|ctx: Arc<ProvisioningContext>| {
                        Box::pin(async move {
                            let tenant = ctx.tenant()?;
                            ctx.retry
                                .execute("create_seed_membership", || {
                                    ctx.activities
                                        .create_seed_membership(tenant.owner_user_id, tenant.id)
                                })
                                .await
                        })
                    }),
                )
                .with_compensation(step_fn(|ctx: Arc<ProvisioningContext>| {
                    Box::pin(async move {
                        let tenant = ctx.tenant()?;
                        ctx.retry
                            .execute("remove_seed_membership", || {
                                ctx.activities
                                    .remove_seed_membership(tenant.owner_user_id, tenant.id)
                            })
                            .await
                    })
                })),
            )
            .step(
                SagaStep::new(
                    "send_welcome_notification",
                    step_fn(|ctx: Arc<ProvisioningContext>| {
                        Box::pin(async move {
                            let tenant = ctx.tenant()?;
                            ctx.activities.send_welcome_notification(&tenant).await
                        })
                    }),
                )
                .best_effort(),
            )
            .step(SagaStep::new(
                "update_status_ready",
                step_fn(|ctx: Arc<ProvisioningContext>| {
                    Box::pin(async move {
                        ctx.retry
                            .execute("update_status", || {
                                ctx.activities
                                    .update_status(ctx.tenant_id, TenantStatus::Ready)
                            })
                            .await?;
                        Ok(())
                    })
                }),
            ))
            .step(SagaStep::new(
                "update_execution_ledger",
                step_fn(|ctx: Arc<ProvisioningContext>| {
                    Box::pin(async move {
                        ctx.retry
                            .execute("update_execution_ledger", || {
                                ctx.activities.mark_completed(&ctx.run_id)
                            })
                            .await
                    })
                }),
            ))
    }
}
