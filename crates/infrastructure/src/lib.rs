pub mod database;
pub mod dispatcher;
pub mod notifier;
pub mod queue_router;
pub mod worker;

pub use database::{
    create_pool, health_check, run_registry_migrations, DatabaseConfig, SchemaScope, SchemaSession,
    ScopedConnection,
};
pub use database::postgres::{
    PostgresExecutionLedgerRepository, PostgresMembershipRepository, PostgresSchemaManager,
    PostgresTenantRepository,
};
pub use dispatcher::{MessageQueueConfig, RabbitMqDispatcher};
pub use notifier::LoggingNotifier;
pub use queue_router::{
    DefaultTierLookup, QueueRouter, QueueRouterConfig, TenantTierLookup, SYSTEM_WORKLOAD_KIND,
};
pub use worker::{WorkerConfig, WorkflowHandler, WorkflowWorker};
