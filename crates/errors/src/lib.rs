use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database operation error: {0}")]
    DatabaseOperation(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("tenant not found: {id}")]
    TenantNotFound { id: Uuid },
    #[error("user not found: {id}")]
    UserNotFound { id: Uuid },
    #[error("workflow execution not found: {run_id}")]
    ExecutionNotFound { run_id: String },
    #[error("invalid schema name: {0}")]
    Validation(String),
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("schema name already taken: {schema_name}")]
    SlugConflict { schema_name: String },
    #[error("concurrent status change on tenant {id}: expected {expected}")]
    TransitionConflict { id: Uuid, expected: String },
    #[error("foreign key violation on constraint {constraint}")]
    ForeignKeyViolation { constraint: String },
    #[error("schema context error: {0}")]
    SchemaContext(String),
    #[error("message queue error: {0}")]
    MessageQueue(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("notification error: {0}")]
    Notification(String),
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type TenantResult<T> = Result<T, TenantError>;

impl TenantError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn message_queue_error<S: Into<String>>(msg: S) -> Self {
        Self::MessageQueue(msg.into())
    }
    pub fn tenant_not_found(id: Uuid) -> Self {
        Self::TenantNotFound { id }
    }
    pub fn invalid_transition<S: Into<String>>(from: S, to: S) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether the execution substrate may retry the failed activity.
    ///
    /// Only transient infrastructure failures qualify; everything else must
    /// propagate unchanged so saga compensation sees an unambiguous signal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TenantError::Database(_)
                | TenantError::DatabaseOperation(_)
                | TenantError::MessageQueue(_)
                | TenantError::SchemaContext(_)
                | TenantError::Timeout(_)
                | TenantError::TransitionConflict { .. }
        )
    }

    /// Whether the error must terminate the saga without further attempts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TenantError::Validation(_)
                | TenantError::InvalidStateTransition { .. }
                | TenantError::ForeignKeyViolation { .. }
                | TenantError::SlugConflict { .. }
                | TenantError::TenantNotFound { .. }
                | TenantError::UserNotFound { .. }
        )
    }
}
