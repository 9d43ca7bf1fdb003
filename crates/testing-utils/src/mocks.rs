//! In-memory implementations of the repository and infrastructure ports.
//!
//! Behavior mirrors the Postgres/RabbitMQ implementations closely enough
//! for lifecycle tests: constraint identity on memberships, terminal-state
//! idempotency in the ledger, guarded status transitions in the registry.
//! Every mock supports counted fault injection per operation name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tenantd_domain::{
    ExecutionLedgerRepository, ExecutionStatus, MembershipRepository, NewTenant, Notifier,
    QueueRoute, SchemaManager, SchemaName, Tenant, TenantMembership, TenantRepository,
    TenantStatus, WorkflowDispatcher, WorkflowExecution, WorkflowMessage, WorkflowType,
};
use tenantd_errors::{TenantError, TenantResult};

/// Counted per-operation fault injection shared by all mocks.
#[derive(Debug, Default)]
struct Faults {
    remaining: Mutex<HashMap<&'static str, u32>>,
}

impl Faults {
    fn arm(&self, operation: &'static str, times: u32) {
        self.remaining.lock().unwrap().insert(operation, times);
    }

    /// Consumes one armed failure for `operation`, if any.
    fn take(&self, operation: &str) -> bool {
        let mut remaining = self.remaining.lock().unwrap();
        match remaining.get_mut(operation) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

/// In-memory tenant registry with the same transition guard as the Postgres
/// implementation. Link a ledger with [`with_ledger`] so the stuck-tenant
/// scan can exclude tenants with live provisioning runs.
///
/// [`with_ledger`]: InMemoryTenantRepository::with_ledger
#[derive(Clone, Default)]
pub struct InMemoryTenantRepository {
    tenants: Arc<Mutex<HashMap<Uuid, Tenant>>>,
    ledger: Option<Arc<InMemoryExecutionLedger>>,
    faults: Arc<Faults>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(mut self, ledger: Arc<InMemoryExecutionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn insert(&self, tenant: Tenant) {
        self.tenants.lock().unwrap().insert(tenant.id, tenant);
    }

    pub fn get(&self, id: Uuid) -> Option<Tenant> {
        self.tenants.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.tenants.lock().unwrap().len()
    }

    /// Arms `times` transient failures for the named operation.
    pub fn fail_times(&self, operation: &'static str, times: u32) {
        self.faults.arm(operation, times);
    }

    fn check_fault(&self, operation: &'static str) -> TenantResult<()> {
        if self.faults.take(operation) {
            return Err(TenantError::DatabaseOperation(format!(
                "injected failure in {operation}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn create_in_provisioning(&self, tenant: &NewTenant) -> TenantResult<Tenant> {
        self.check_fault("create_in_provisioning")?;
        let mut tenants = self.tenants.lock().unwrap();
        if tenants
            .values()
            .any(|t| t.schema_name == tenant.schema_name)
        {
            return Err(TenantError::SlugConflict {
                schema_name: tenant.schema_name.clone(),
            });
        }
        let now = Utc::now();
        let row = Tenant {
            id: tenant.id,
            name: tenant.name.clone(),
            slug: tenant.slug.clone(),
            schema_name: tenant.schema_name.clone(),
            status: TenantStatus::Provisioning,
            is_active: false,
            owner_user_id: tenant.owner_user_id,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        tenants.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> TenantResult<Option<Tenant>> {
        self.check_fault("find_by_id")?;
        Ok(self.tenants.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_schema_name(&self, schema_name: &str) -> TenantResult<Option<Tenant>> {
        Ok(self
            .tenants
            .lock()
            .unwrap()
            .values()
            .find(|t| t.schema_name == schema_name)
            .cloned())
    }

    async fn update_status(&self, id: Uuid, new_status: TenantStatus) -> TenantResult<Tenant> {
        self.check_fault("update_status")?;
        let mut tenants = self.tenants.lock().unwrap();
        let tenant = tenants
            .get_mut(&id)
            .ok_or(TenantError::TenantNotFound { id })?;
        tenant.status.validate_transition(new_status)?;
        if tenant.status == new_status {
            return Ok(tenant.clone());
        }
        tenant.status = new_status;
        tenant.is_active = new_status.is_active();
        if new_status == TenantStatus::Deleted && tenant.deleted_at.is_none() {
            tenant.deleted_at = Some(Utc::now());
        }
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn find_stuck_provisioning(&self, cutoff: DateTime<Utc>) -> TenantResult<Vec<Tenant>> {
        self.check_fault("find_stuck_provisioning")?;
        let tenants = self.tenants.lock().unwrap();
        let mut stuck = Vec::new();
        for tenant in tenants.values() {
            if tenant.status != TenantStatus::Provisioning || tenant.updated_at >= cutoff {
                continue;
            }
            let live = match &self.ledger {
                Some(ledger) => ledger.has_live_provisioning(tenant.id),
                None => false,
            };
            if !live {
                stuck.push(tenant.clone());
            }
        }
        Ok(stuck)
    }
}

/// In-memory execution ledger with run-id uniqueness and terminal-state
/// idempotency.
#[derive(Default)]
pub struct InMemoryExecutionLedger {
    rows: Mutex<Vec<WorkflowExecution>>,
    next_id: AtomicI64,
    faults: Faults,
}

impl InMemoryExecutionLedger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    pub fn insert(&self, execution: WorkflowExecution) {
        self.rows.lock().unwrap().push(execution);
    }

    pub fn all(&self) -> Vec<WorkflowExecution> {
        self.rows.lock().unwrap().clone()
    }

    pub fn get(&self, run_id: &str) -> Option<WorkflowExecution> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.run_id == run_id)
            .cloned()
    }

    pub fn fail_times(&self, operation: &'static str, times: u32) {
        self.faults.arm(operation, times);
    }

    fn check_fault(&self, operation: &'static str) -> TenantResult<()> {
        if self.faults.take(operation) {
            return Err(TenantError::DatabaseOperation(format!(
                "injected failure in {operation}"
            )));
        }
        Ok(())
    }

    fn has_live_provisioning(&self, tenant_id: Uuid) -> bool {
        self.rows.lock().unwrap().iter().any(|e| {
            e.tenant_id == tenant_id
                && e.workflow == WorkflowType::TenantProvisioning
                && matches!(
                    e.status,
                    ExecutionStatus::Running | ExecutionStatus::Completed
                )
        })
    }
}

#[async_trait]
impl ExecutionLedgerRepository for InMemoryExecutionLedger {
    async fn create_pending(
        &self,
        execution: &WorkflowExecution,
    ) -> TenantResult<WorkflowExecution> {
        self.check_fault("create_pending")?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter().find(|e| e.run_id == execution.run_id) {
            return Ok(existing.clone());
        }
        let mut row = execution.clone();
        row.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rows.push(row.clone());
        Ok(row)
    }

    async fn mark_running(
        &self,
        run_id: &str,
        workflow: WorkflowType,
        tenant_id: Uuid,
    ) -> TenantResult<()> {
        self.check_fault("mark_running")?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|e| e.run_id == run_id) {
            if !row.status.is_terminal() {
                row.status = ExecutionStatus::Running;
                row.started_at = Utc::now();
            }
            return Ok(());
        }
        let mut row =
            WorkflowExecution::new_pending(run_id.to_string(), workflow, tenant_id);
        row.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        row.status = ExecutionStatus::Running;
        rows.push(row);
        Ok(())
    }

    async fn mark_completed(&self, run_id: &str) -> TenantResult<()> {
        self.check_fault("mark_completed")?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|e| e.run_id == run_id) {
            if !row.status.is_terminal() {
                row.status = ExecutionStatus::Completed;
                row.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, run_id: &str, error: &str) -> TenantResult<()> {
        self.check_fault("mark_failed")?;
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|e| e.run_id == run_id) {
            if !row.status.is_terminal() {
                row.status = ExecutionStatus::Failed;
                row.completed_at = Some(Utc::now());
                row.error_message = Some(error.to_string());
            }
        }
        Ok(())
    }

    async fn find_by_run_id(&self, run_id: &str) -> TenantResult<Option<WorkflowExecution>> {
        Ok(self.get(run_id))
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> TenantResult<Vec<WorkflowExecution>> {
        let mut runs: Vec<WorkflowExecution> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn has_live_provisioning_run(&self, tenant_id: Uuid) -> TenantResult<bool> {
        Ok(self.has_live_provisioning(tenant_id))
    }

    async fn find_stale_running(
        &self,
        cutoff: DateTime<Utc>,
    ) -> TenantResult<Vec<WorkflowExecution>> {
        self.check_fault("find_stale_running")?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.status == ExecutionStatus::Running && e.started_at < cutoff)
            .cloned()
            .collect())
    }
}

/// In-memory membership store reproducing the constraint identities the
/// seed activity interprets: duplicate `(user, tenant)` is `Ok(None)`,
/// unknown users surface the FK constraint name.
#[derive(Default)]
pub struct InMemoryMembershipRepository {
    rows: Mutex<Vec<TenantMembership>>,
    known_users: Mutex<HashSet<Uuid>>,
    next_id: AtomicI64,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// FK enforcement is off until at least one user is registered.
    pub fn register_user(&self, user_id: Uuid) {
        self.known_users.lock().unwrap().insert(user_id);
    }

    pub fn all(&self) -> Vec<TenantMembership> {
        self.rows.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn create_seed(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: &str,
    ) -> TenantResult<Option<TenantMembership>> {
        {
            let known = self.known_users.lock().unwrap();
            if !known.is_empty() && !known.contains(&user_id) {
                return Err(TenantError::ForeignKeyViolation {
                    constraint: "fk_tenant_memberships_user".to_string(),
                });
            }
        }
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|m| m.user_id == user_id && m.tenant_id == tenant_id)
        {
            return Ok(None);
        }
        let row = TenantMembership {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id,
            tenant_id,
            role: role.to_string(),
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(Some(row))
    }

    async fn find(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> TenantResult<Option<TenantMembership>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id)
            .cloned())
    }

    async fn remove(&self, user_id: Uuid, tenant_id: Uuid) -> TenantResult<()> {
        self.rows
            .lock()
            .unwrap()
            .retain(|m| !(m.user_id == user_id && m.tenant_id == tenant_id));
        Ok(())
    }
}

/// Schema manager that records every DDL call and tracks which schemas
/// exist, with the same idempotency as the Postgres implementation.
#[derive(Default)]
pub struct RecordingSchemaManager {
    existing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    faults: Faults,
}

impl RecordingSchemaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered log of DDL calls, e.g. `"create:tenant_acme"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn schema_exists(&self, schema_name: &str) -> bool {
        self.existing.lock().unwrap().contains(schema_name)
    }

    pub fn fail_times(&self, operation: &'static str, times: u32) {
        self.faults.arm(operation, times);
    }

    fn check_fault(&self, operation: &'static str) -> TenantResult<()> {
        if self.faults.take(operation) {
            return Err(TenantError::SchemaContext(format!(
                "injected failure in {operation}"
            )));
        }
        Ok(())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SchemaManager for RecordingSchemaManager {
    async fn create_schema(&self, name: &SchemaName) -> TenantResult<()> {
        self.check_fault("create_schema")?;
        self.record(format!("create:{}", name.schema_name()));
        self.existing.lock().unwrap().insert(name.schema_name());
        Ok(())
    }

    async fn run_migrations(&self, name: &SchemaName) -> TenantResult<()> {
        self.check_fault("run_migrations")?;
        self.record(format!("migrate:{}", name.schema_name()));
        Ok(())
    }

    async fn drop_schema(&self, name: &SchemaName) -> TenantResult<()> {
        self.check_fault("drop_schema")?;
        self.record(format!("drop:{}", name.schema_name()));
        self.existing.lock().unwrap().remove(&name.schema_name());
        Ok(())
    }
}

/// Dispatcher that records every dispatched message with its route.
#[derive(Default)]
pub struct RecordingDispatcher {
    dispatches: Mutex<Vec<(WorkflowMessage, QueueRoute)>>,
    faults: Faults,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatches(&self) -> Vec<(WorkflowMessage, QueueRoute)> {
        self.dispatches.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.dispatches.lock().unwrap().len()
    }

    pub fn fail_times(&self, times: u32) {
        self.faults.arm("dispatch", times);
    }
}

#[async_trait]
impl WorkflowDispatcher for RecordingDispatcher {
    async fn dispatch(&self, message: &WorkflowMessage, route: &QueueRoute) -> TenantResult<()> {
        if self.faults.take("dispatch") {
            return Err(TenantError::message_queue_error(
                "injected dispatch failure",
            ));
        }
        self.dispatches
            .lock()
            .unwrap()
            .push((message.clone(), route.clone()));
        Ok(())
    }
}

/// Notifier that records welcome notifications, optionally failing all of
/// them to exercise best-effort handling.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, String)>>,
    faults: Faults,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(Uuid, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_times(&self, times: u32) {
        self.faults.arm("send_welcome", times);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_welcome(&self, tenant_id: Uuid, tenant_name: &str) -> TenantResult<()> {
        if self.faults.take("send_welcome") {
            return Err(TenantError::Notification(
                "injected notification failure".to_string(),
            ));
        }
        self.sent
            .lock()
            .unwrap()
            .push((tenant_id, tenant_name.to_string()));
        Ok(())
    }
}
