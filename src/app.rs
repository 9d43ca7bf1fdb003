use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tenantd_api::{create_routes, AppState};
use tenantd_infrastructure::{
    create_pool, run_registry_migrations, DefaultTierLookup, LoggingNotifier,
    PostgresExecutionLedgerRepository, PostgresMembershipRepository, PostgresSchemaManager,
    PostgresTenantRepository, QueueRouter, RabbitMqDispatcher, SchemaSession, WorkerConfig,
    WorkflowWorker,
};
use tenantd_orchestrator::{
    DeprovisioningOrchestrator, OrchestratorHandler, ProvisioningOrchestrator, RetryPolicy,
    Sweeper, TenantActivities, TenantService,
};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Api,
    Worker,
    Sweeper,
    All,
}

impl AppMode {
    fn runs_api(&self) -> bool {
        matches!(self, AppMode::Api | AppMode::All)
    }
    fn runs_worker(&self) -> bool {
        matches!(self, AppMode::Worker | AppMode::All)
    }
    fn runs_sweeper(&self) -> bool {
        matches!(self, AppMode::Sweeper | AppMode::All)
    }
}

/// Composition root. Wires the pool, repositories, dispatcher and
/// orchestrators once and hands each long-running component its own
/// shutdown receiver.
pub struct Application {
    mode: AppMode,
    bind_address: String,
    pool: PgPool,
    service: Arc<TenantService>,
    worker: Option<Arc<WorkflowWorker>>,
    sweeper: Option<Arc<Sweeper>>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        let pool = create_pool(&config.database)
            .await
            .context("failed to create database pool")?;
        run_registry_migrations(&pool)
            .await
            .context("failed to apply registry migrations")?;

        let tenants = Arc::new(PostgresTenantRepository::new(pool.clone()));
        let ledger = Arc::new(PostgresExecutionLedgerRepository::new(pool.clone()));
        let memberships = Arc::new(PostgresMembershipRepository::new(pool.clone()));
        let schemas = Arc::new(PostgresSchemaManager::new(SchemaSession::new(pool.clone())));
        let notifier = Arc::new(LoggingNotifier);

        let dispatcher = Arc::new(
            RabbitMqDispatcher::connect(&config.message_queue)
                .await
                .context("failed to connect to message queue")?,
        );
        let router = Arc::new(
            QueueRouter::new(&config.queue_router, Arc::new(DefaultTierLookup))
                .context("invalid queue router configuration")?,
        );

        let service = Arc::new(TenantService::new(
            tenants.clone(),
            ledger.clone(),
            dispatcher.clone(),
            router.clone(),
        ));

        let worker = if mode.runs_worker() {
            let activities = Arc::new(TenantActivities::new(
                tenants.clone(),
                memberships,
                ledger.clone(),
                schemas,
                notifier,
            ));
            let retry = RetryPolicy::default();
            let handler = Arc::new(OrchestratorHandler::new(
                Arc::new(ProvisioningOrchestrator::new(
                    activities.clone(),
                    retry.clone(),
                )),
                Arc::new(DeprovisioningOrchestrator::new(activities, retry)),
            ));

            let shards: Vec<u32> = if config.worker.shards.is_empty() {
                (0..router.shard_count()).collect()
            } else {
                config.worker.shards.clone()
            };
            let mut queues = router.queue_names_for_shards("provisioning", &shards);
            queues.extend(router.queue_names_for_shards("deprovisioning", &shards));

            let worker = WorkflowWorker::connect(
                &config.message_queue,
                queues,
                handler,
                WorkerConfig {
                    poll_interval: std::time::Duration::from_secs(
                        config.worker.poll_interval_seconds,
                    ),
                },
            )
            .await
            .context("failed to start workflow worker")?;
            Some(Arc::new(worker))
        } else {
            None
        };

        let sweeper = if mode.runs_sweeper() {
            Some(Arc::new(Sweeper::new(
                tenants,
                ledger,
                dispatcher,
                router,
                (&config.sweeper).into(),
            )))
        } else {
            None
        };

        Ok(Self {
            mode,
            bind_address: config.api.bind_address,
            pool,
            service,
            worker,
            sweeper,
        })
    }

    /// Runs every component for the configured mode until shutdown, then
    /// closes the outbound connections.
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut handles = Vec::new();

        if self.mode.runs_api() {
            let router = create_routes(AppState {
                service: self.service.clone(),
            });
            let bind_address = self.bind_address.clone();
            let mut rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                let listener = tokio::net::TcpListener::bind(&bind_address)
                    .await
                    .with_context(|| format!("failed to bind {bind_address}"))?;
                info!(%bind_address, "api server listening");
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = rx.recv().await;
                    })
                    .await
                    .context("api server failed")
            }));
        }

        if let Some(worker) = &self.worker {
            let worker = worker.clone();
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                worker
                    .run(rx)
                    .await
                    .map_err(anyhow::Error::from)
                    .context("workflow worker failed")
            }));
        }

        if let Some(sweeper) = &self.sweeper {
            let sweeper = sweeper.clone();
            let rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                sweeper
                    .run(rx)
                    .await
                    .map_err(anyhow::Error::from)
                    .context("sweeper failed")
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("component exited with error: {e:#}");
                    return Err(e);
                }
                Err(e) => {
                    error!("component task panicked: {e}");
                    return Err(e.into());
                }
            }
        }

        if let Some(worker) = &self.worker {
            let _ = worker.close().await;
        }
        self.pool.close().await;
        info!("application stopped");
        Ok(())
    }
}
