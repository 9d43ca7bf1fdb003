//! Builders for test entities with sensible defaults.

use chrono::{Duration, Utc};
use uuid::Uuid;

use tenantd_domain::{
    ExecutionStatus, Tenant, TenantStatus, WorkflowExecution, WorkflowType,
};

pub struct TenantBuilder {
    tenant: Tenant,
}

impl TenantBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            tenant: Tenant {
                id: Uuid::new_v4(),
                name: "Acme Corp".to_string(),
                slug: "acme".to_string(),
                schema_name: "tenant_acme".to_string(),
                status: TenantStatus::Provisioning,
                is_active: false,
                owner_user_id: Uuid::new_v4(),
                deleted_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.tenant.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.tenant.name = name.to_string();
        self
    }

    /// Sets slug and the derived schema name together.
    pub fn with_slug(mut self, slug: &str) -> Self {
        self.tenant.slug = slug.to_string();
        self.tenant.schema_name = format!("tenant_{slug}");
        self
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.tenant.status = status;
        self.tenant.is_active = status.is_active();
        self
    }

    pub fn with_owner(mut self, owner_user_id: Uuid) -> Self {
        self.tenant.owner_user_id = owner_user_id;
        self
    }

    /// Backdates `updated_at`, for staleness scans.
    pub fn updated_secs_ago(mut self, secs: i64) -> Self {
        self.tenant.updated_at = Utc::now() - Duration::seconds(secs);
        self
    }

    pub fn build(self) -> Tenant {
        self.tenant
    }
}

impl Default for TenantBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ExecutionBuilder {
    execution: WorkflowExecution,
}

impl ExecutionBuilder {
    pub fn new() -> Self {
        Self {
            execution: WorkflowExecution::new_pending(
                Uuid::new_v4().to_string(),
                WorkflowType::TenantProvisioning,
                Uuid::new_v4(),
            ),
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.execution.run_id = run_id.to_string();
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowType) -> Self {
        self.execution.workflow = workflow;
        self
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.execution.tenant_id = tenant_id;
        self
    }

    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.execution.status = status;
        self
    }

    /// Backdates `started_at`, for staleness scans.
    pub fn started_secs_ago(mut self, secs: i64) -> Self {
        self.execution.started_at = Utc::now() - Duration::seconds(secs);
        self
    }

    pub fn build(self) -> WorkflowExecution {
        self.execution
    }
}

impl Default for ExecutionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
