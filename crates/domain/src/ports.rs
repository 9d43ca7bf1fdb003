//! Infrastructure ports consumed by the orchestrators: schema DDL, workflow
//! dispatch (the durable-execution substrate boundary) and notification.

use async_trait::async_trait;
use tenantd_errors::TenantResult;
use uuid::Uuid;

use crate::messaging::WorkflowMessage;
use crate::value_objects::{QueueRoute, SchemaName};

/// Schema DDL port. Every operation is idempotent: creating an existing
/// schema and dropping an absent one are both success.
#[async_trait]
pub trait SchemaManager: Send + Sync {
    async fn create_schema(&self, name: &SchemaName) -> TenantResult<()>;

    /// Runs the tenant migration set inside the tenant's schema context.
    /// The migration tool tracks applied state, so re-running is a no-op
    /// past the already-applied point.
    async fn run_migrations(&self, name: &SchemaName) -> TenantResult<()>;

    async fn drop_schema(&self, name: &SchemaName) -> TenantResult<()>;
}

/// Dispatch boundary of the durable-execution substrate. Delivery is
/// at-least-once; the activities the dispatched workflows invoke must stay
/// idempotent.
#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    async fn dispatch(&self, message: &WorkflowMessage, route: &QueueRoute) -> TenantResult<()>;
}

/// Outbound notification boundary. Delivery mechanics are out of scope;
/// provisioning treats notification as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_welcome(&self, tenant_id: Uuid, tenant_name: &str) -> TenantResult<()>;
}
