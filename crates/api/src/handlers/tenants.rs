use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tenantd_domain::{Tenant, WorkflowExecution};

use crate::error::ApiResult;
use crate::response::{accepted, created, success};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub slug: String,
    pub owner_user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub schema_name: String,
    pub status: String,
    pub is_active: bool,
    pub owner_user_id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name,
            slug: t.slug,
            schema_name: t.schema_name,
            status: t.status.as_str().to_string(),
            is_active: t.is_active,
            owner_user_id: t.owner_user_id,
            deleted_at: t.deleted_at,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub run_id: String,
    pub workflow: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<WorkflowExecution> for ExecutionResponse {
    fn from(e: WorkflowExecution) -> Self {
        Self {
            run_id: e.run_id,
            workflow: e.workflow.as_str().to_string(),
            status: e.status.as_str().to_string(),
            started_at: e.started_at,
            completed_at: e.completed_at,
            error_message: e.error_message,
        }
    }
}

/// POST /api/tenants. Returns 201 with the tenant still in `PROVISIONING`;
/// provisioning itself runs asynchronously on the workers.
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state
        .service
        .register_tenant(&request.name, &request.slug, request.owner_user_id)
        .await?;
    Ok(created(TenantResponse::from(tenant)))
}

/// GET /api/tenants/{id}/status
pub async fn get_tenant_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state.service.get_status(id).await?;
    Ok(success(TenantResponse::from(tenant)))
}

/// POST /api/tenants/{id}/delete. Returns 202: deprovisioning is dispatched,
/// not performed inline.
pub async fn delete_tenant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let execution = state.service.request_deletion(id).await?;
    Ok(accepted(ExecutionResponse::from(execution)))
}

/// POST /api/tenants/{id}/retry. Re-runs provisioning for a failed tenant.
pub async fn retry_tenant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let execution = state.service.retry_provisioning(id).await?;
    Ok(accepted(ExecutionResponse::from(execution)))
}

/// GET /api/tenants/{id}/executions
pub async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let executions = state.service.list_executions(id).await?;
    let body: Vec<ExecutionResponse> = executions.into_iter().map(Into::into).collect();
    Ok(success(body))
}
