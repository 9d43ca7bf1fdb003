use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tenantd_orchestrator::TenantService;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    health::health_check,
    tenants::{create_tenant, delete_tenant, get_tenant_status, list_executions, retry_tenant},
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TenantService>,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/tenants", post(create_tenant))
        .route("/api/tenants/{id}/status", get(get_tenant_status))
        .route("/api/tenants/{id}/delete", post(delete_tenant))
        .route("/api/tenants/{id}/retry", post(retry_tenant))
        .route("/api/tenants/{id}/executions", get(list_executions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
