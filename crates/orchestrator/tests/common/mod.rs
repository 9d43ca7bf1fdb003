use std::sync::Arc;

use tenantd_domain::{Tenant, TenantStatus};
use tenantd_infrastructure::{DefaultTierLookup, QueueRouter, QueueRouterConfig};
use tenantd_orchestrator::{
    DeprovisioningOrchestrator, ProvisioningOrchestrator, RetryPolicy, Sweeper, SweeperConfig,
    TenantActivities, TenantService,
};
use tenantd_testing_utils::{
    InMemoryExecutionLedger, InMemoryMembershipRepository, InMemoryTenantRepository,
    RecordingDispatcher, RecordingNotifier, RecordingSchemaManager, TenantBuilder,
};
use uuid::Uuid;

/// Everything a lifecycle test needs, wired over the in-memory doubles.
pub struct Harness {
    pub tenants: Arc<InMemoryTenantRepository>,
    pub ledger: Arc<InMemoryExecutionLedger>,
    pub memberships: Arc<InMemoryMembershipRepository>,
    pub schemas: Arc<RecordingSchemaManager>,
    pub notifier: Arc<RecordingNotifier>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub activities: Arc<TenantActivities>,
}

impl Harness {
    pub fn new() -> Self {
        let ledger = Arc::new(InMemoryExecutionLedger::new());
        let tenants = Arc::new(InMemoryTenantRepository::new().with_ledger(ledger.clone()));
        let memberships = Arc::new(InMemoryMembershipRepository::new());
        let schemas = Arc::new(RecordingSchemaManager::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let activities = Arc::new(TenantActivities::new(
            tenants.clone(),
            memberships.clone(),
            ledger.clone(),
            schemas.clone(),
            notifier.clone(),
        ));
        Self {
            tenants,
            ledger,
            memberships,
            schemas,
            notifier,
            dispatcher,
            activities,
        }
    }

    pub fn provisioner(&self) -> ProvisioningOrchestrator {
        ProvisioningOrchestrator::new(self.activities.clone(), RetryPolicy::immediate(3))
    }

    pub fn deprovisioner(&self) -> DeprovisioningOrchestrator {
        DeprovisioningOrchestrator::new(self.activities.clone(), RetryPolicy::immediate(3))
    }

    pub fn router(&self) -> Arc<QueueRouter> {
        // single shard keeps queue names deterministic in assertions
        Arc::new(
            QueueRouter::new(
                &QueueRouterConfig {
                    queue_prefix: "tenantd".into(),
                    shard_count: 1,
                },
                Arc::new(DefaultTierLookup),
            )
            .unwrap(),
        )
    }

    pub fn service(&self) -> TenantService {
        TenantService::new(
            self.tenants.clone(),
            self.ledger.clone(),
            self.dispatcher.clone(),
            self.router(),
        )
    }

    pub fn sweeper(&self, config: SweeperConfig) -> Sweeper {
        Sweeper::new(
            self.tenants.clone(),
            self.ledger.clone(),
            self.dispatcher.clone(),
            self.router(),
            config,
        )
    }

    /// Inserts a tenant row directly, returning it.
    pub fn seed_tenant(&self, slug: &str, status: TenantStatus) -> Tenant {
        let tenant = TenantBuilder::new().with_slug(slug).with_status(status).build();
        self.memberships.register_user(tenant.owner_user_id);
        self.tenants.insert(tenant.clone());
        tenant
    }
}

pub fn run_id() -> String {
    Uuid::new_v4().to_string()
}
