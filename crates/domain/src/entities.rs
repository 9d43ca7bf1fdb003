use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenantd_errors::{TenantError, TenantResult};
use uuid::Uuid;

/// Lifecycle status of a tenant in the registry.
///
/// Mutated only through the repository's validated `update_status` choke
/// point; any transition outside [`TenantStatus::can_transition_to`] is
/// rejected, never silently applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TenantStatus {
    #[serde(rename = "PROVISIONING")]
    Provisioning,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "DELETING")]
    Deleting,
    #[serde(rename = "DELETED")]
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "PROVISIONING",
            TenantStatus::Ready => "READY",
            TenantStatus::Failed => "FAILED",
            TenantStatus::Deleting => "DELETING",
            TenantStatus::Deleted => "DELETED",
        }
    }

    /// The closed transition table of the tenant state machine.
    ///
    /// `Failed -> Provisioning` is the explicit retry path and
    /// `Failed -> Deleting` lets failed tenants be cleaned up. Deletion is
    /// not permitted while provisioning is in flight.
    pub fn can_transition_to(&self, next: TenantStatus) -> bool {
        use TenantStatus::*;
        matches!(
            (self, next),
            (Provisioning, Ready)
                | (Provisioning, Failed)
                | (Failed, Provisioning)
                | (Ready, Deleting)
                | (Failed, Deleting)
                | (Deleting, Deleted)
        )
    }

    /// Validates a transition, treating identity transitions as no-ops so
    /// that re-executed activities stay idempotent after ambiguous failures.
    pub fn validate_transition(&self, next: TenantStatus) -> TenantResult<()> {
        if *self == next || self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TenantError::invalid_transition(self.as_str(), next.as_str()))
        }
    }

    /// `is_active` is a projection of status, never set independently.
    pub fn is_active(&self) -> bool {
        matches!(self, TenantStatus::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TenantStatus::Failed | TenantStatus::Deleted)
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for TenantStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TenantStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "PROVISIONING" => Ok(TenantStatus::Provisioning),
            "READY" => Ok(TenantStatus::Ready),
            "FAILED" => Ok(TenantStatus::Failed),
            "DELETING" => Ok(TenantStatus::Deleting),
            "DELETED" => Ok(TenantStatus::Deleted),
            _ => Err(format!("Invalid tenant status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TenantStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Canonical registry record of tenant identity and lifecycle.
///
/// Rows are never hard-deleted; deprovisioning drops the schema but keeps
/// the row with `deleted_at` set for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// Derived `"tenant_" + slug`, unique under normalization.
    pub schema_name: String,
    pub status: TenantStatus,
    pub is_active: bool,
    /// Admin-membership intent recorded at registration; the seed
    /// membership row itself is created by the provisioning saga.
    pub owner_user_id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Workflow kind dispatched through the execution substrate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowType {
    #[serde(rename = "TENANT_PROVISIONING")]
    TenantProvisioning,
    #[serde(rename = "TENANT_DEPROVISIONING")]
    TenantDeprovisioning,
}

impl WorkflowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowType::TenantProvisioning => "TENANT_PROVISIONING",
            WorkflowType::TenantDeprovisioning => "TENANT_DEPROVISIONING",
        }
    }

    /// Workload kind used by the queue router when building queue names.
    pub fn workload_kind(&self) -> &'static str {
        match self {
            WorkflowType::TenantProvisioning => "provisioning",
            WorkflowType::TenantDeprovisioning => "deprovisioning",
        }
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for WorkflowType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for WorkflowType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "TENANT_PROVISIONING" => Ok(WorkflowType::TenantProvisioning),
            "TENANT_DEPROVISIONING" => Ok(WorkflowType::TenantDeprovisioning),
            _ => Err(format!("Invalid workflow type: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for WorkflowType {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Status of one workflow run in the execution ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for ExecutionStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ExecutionStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "PENDING" => Ok(ExecutionStatus::Pending),
            "RUNNING" => Ok(ExecutionStatus::Running),
            "COMPLETED" => Ok(ExecutionStatus::Completed),
            "FAILED" => Ok(ExecutionStatus::Failed),
            _ => Err(format!("Invalid execution status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ExecutionStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Execution ledger entry, one row per workflow run.
///
/// Created `Pending` before dispatch, flipped to `Running` by the
/// orchestrator on entry and to exactly one terminal state on exit. Owned
/// exclusively by the orchestration crate; business code never writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: i64,
    /// Unique run identifier (true uniqueness constraint in the store).
    pub run_id: String,
    pub workflow: WorkflowType,
    pub tenant_id: Uuid,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowExecution {
    pub fn new_pending(run_id: String, workflow: WorkflowType, tenant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            run_id,
            workflow,
            tenant_id,
            status: ExecutionStatus::Pending,
            started_at: now,
            completed_at: None,
            error_message: None,
            created_at: now,
        }
    }
}

/// Membership linking a user to a tenant. The provisioning saga seeds one
/// `admin` row for the owner; uniqueness on `(user_id, tenant_id)` is a
/// database constraint, never an application-level check-then-act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantMembership {
    pub id: i64,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
