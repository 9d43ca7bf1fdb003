use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tenantd_errors::TenantError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("lifecycle error: {0}")]
    Tenant(#[from] TenantError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Tenant(e) => match e {
                TenantError::TenantNotFound { .. }
                | TenantError::UserNotFound { .. }
                | TenantError::ExecutionNotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND")
                }
                TenantError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                TenantError::SlugConflict { .. } => (StatusCode::CONFLICT, "SLUG_CONFLICT"),
                TenantError::InvalidStateTransition { .. }
                | TenantError::TransitionConflict { .. } => {
                    (StatusCode::CONFLICT, "INVALID_STATE")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        // internal details stay in the logs, not the response body
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::Tenant(TenantError::TenantNotFound { id: Uuid::new_v4() });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_400() {
        let err = ApiError::Tenant(TenantError::Validation("bad slug".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn slug_conflict_and_invalid_transition_map_to_409() {
        let conflict = ApiError::Tenant(TenantError::SlugConflict {
            schema_name: "tenant_acme".into(),
        });
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let transition =
            ApiError::Tenant(TenantError::invalid_transition("PROVISIONING", "DELETING"));
        assert_eq!(transition.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn infrastructure_errors_map_to_500() {
        let err = ApiError::Tenant(TenantError::MessageQueue("broker down".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
