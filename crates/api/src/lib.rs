//! HTTP surface for tenant lifecycle operations. Thin handlers over
//! [`tenantd_orchestrator::TenantService`]; every slow path is dispatched,
//! never awaited inline.

pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};
