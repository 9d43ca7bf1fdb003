use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tenantd_domain::{ExecutionLedgerRepository, WorkflowExecution, WorkflowType};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const EXECUTION_COLUMNS: &str = "id, run_id, workflow, tenant_id, status, started_at, \
                                 completed_at, error_message, created_at";

pub struct PostgresExecutionLedgerRepository {
    pool: PgPool,
}

impl PostgresExecutionLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_execution(row: &sqlx::postgres::PgRow) -> TenantResult<WorkflowExecution> {
        Ok(WorkflowExecution {
            id: row.try_get("id")?,
            run_id: row.try_get("run_id")?,
            workflow: row.try_get("workflow")?,
            tenant_id: row.try_get("tenant_id")?,
            status: row.try_get("status")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ExecutionLedgerRepository for PostgresExecutionLedgerRepository {
    #[instrument(skip(self, execution), fields(run_id = %execution.run_id, workflow = %execution.workflow))]
    async fn create_pending(
        &self,
        execution: &WorkflowExecution,
    ) -> TenantResult<WorkflowExecution> {
        // ON CONFLICT keeps double-submits idempotent: the run_id carries a
        // true uniqueness constraint, so at most one row ever exists.
        sqlx::query(
            r#"
            INSERT INTO workflow_executions (run_id, workflow, tenant_id, status, started_at)
            VALUES ($1, $2, $3, 'PENDING', $4)
            ON CONFLICT (run_id) DO NOTHING
            "#,
        )
        .bind(&execution.run_id)
        .bind(execution.workflow)
        .bind(execution.tenant_id)
        .bind(execution.started_at)
        .execute(&self.pool)
        .await?;

        self.find_by_run_id(&execution.run_id)
            .await?
            .ok_or_else(|| TenantError::ExecutionNotFound {
                run_id: execution.run_id.clone(),
            })
    }

    #[instrument(skip(self))]
    async fn mark_running(
        &self,
        run_id: &str,
        workflow: WorkflowType,
        tenant_id: Uuid,
    ) -> TenantResult<()> {
        // Upsert: a sweeper re-dispatch may arrive with a fresh run id that
        // has no pending row yet. Terminal rows are never reverted.
        sqlx::query(
            r#"
            INSERT INTO workflow_executions (run_id, workflow, tenant_id, status, started_at)
            VALUES ($1, $2, $3, 'RUNNING', now())
            ON CONFLICT (run_id) DO UPDATE
            SET status = 'RUNNING', started_at = now()
            WHERE workflow_executions.status IN ('PENDING', 'RUNNING')
            "#,
        )
        .bind(run_id)
        .bind(workflow)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        debug!(run_id, "execution marked running");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_completed(&self, run_id: &str) -> TenantResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'COMPLETED', completed_at = COALESCE(completed_at, now())
            WHERE run_id = $1 AND status IN ('PENDING', 'RUNNING', 'COMPLETED')
            "#,
        )
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            // the other terminal state already landed; keep it
            warn!(run_id, "completion ignored, run already terminal");
        }
        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn mark_failed(&self, run_id: &str, error: &str) -> TenantResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'FAILED',
                completed_at = COALESCE(completed_at, now()),
                error_message = COALESCE(error_message, $2)
            WHERE run_id = $1 AND status IN ('PENDING', 'RUNNING', 'FAILED')
            "#,
        )
        .bind(run_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            warn!(run_id, "failure ignored, run already terminal");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_run_id(&self, run_id: &str) -> TenantResult<Option<WorkflowExecution>> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions WHERE run_id = $1"
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_execution).transpose()
    }

    #[instrument(skip(self))]
    async fn list_for_tenant(&self, tenant_id: Uuid) -> TenantResult<Vec<WorkflowExecution>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions \
             WHERE tenant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_execution).collect()
    }

    #[instrument(skip(self))]
    async fn has_live_provisioning_run(&self, tenant_id: Uuid) -> TenantResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM workflow_executions
                WHERE tenant_id = $1
                  AND workflow = 'TENANT_PROVISIONING'
                  AND status IN ('RUNNING', 'COMPLETED')
            ) AS live
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("live")?)
    }

    #[instrument(skip(self))]
    async fn find_stale_running(
        &self,
        cutoff: DateTime<Utc>,
    ) -> TenantResult<Vec<WorkflowExecution>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM workflow_executions \
             WHERE status = 'RUNNING' AND started_at < $1 ORDER BY started_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_execution).collect()
    }
}
