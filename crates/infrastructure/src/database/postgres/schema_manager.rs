use async_trait::async_trait;
use tenantd_domain::{SchemaManager, SchemaName};
use tenantd_errors::{TenantError, TenantResult};
use tracing::{info, instrument};

use crate::database::manager::TENANT_MIGRATOR;
use crate::database::schema_session::{SchemaScope, SchemaSession};

/// Schema DDL through the session layer. DDL runs under public scope; the
/// tenant migrator runs under the tenant's own scope so its tracking table
/// lands inside the tenant schema.
pub struct PostgresSchemaManager {
    session: SchemaSession,
}

impl PostgresSchemaManager {
    pub fn new(session: SchemaSession) -> Self {
        Self { session }
    }
}


#[async_trait]
impl SchemaManager for PostgresSchemaManager {
    #[instrument(skip(self), fields(schema = %name))]
    async fn create_schema(&self, name: &SchemaName) -> TenantResult<()> {
        let mut conn = self.session.acquire(&SchemaScope::Public).await?;
        // IF NOT EXISTS: "already exists" from a concurrent duplicate
        // attempt is success, not failure
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", name.quoted()))
            .execute(conn.as_mut())
            .await?;
        conn.release().await?;
        info!(schema = %name, "schema created");
        Ok(())
    }

    #[instrument(skip(self), fields(schema = %name))]
    async fn run_migrations(&self, name: &SchemaName) -> TenantResult<()> {
        let mut conn = self
            .session
            .acquire(&SchemaScope::Tenant(name.clone()))
            .await?;
        // `run_direct` instead of `run`: the `Acquire` bound on `run` trips
        // rust-lang/rust#102211 inside the async_trait + instrument future.
        let result = TENANT_MIGRATOR.run_direct(conn.as_mut()).await;
        match result {
            Ok(()) => {
                conn.release().await?;
                info!(schema = %name, "tenant migrations applied");
                Ok(())
            }
            Err(e) => {
                // guard drop discards the scoped connection
                Err(TenantError::Migration(format!(
                    "tenant migrations failed for {name}: {e}"
                )))
            }
        }
    }

    #[instrument(skip(self), fields(schema = %name))]
    async fn drop_schema(&self, name: &SchemaName) -> TenantResult<()> {
        let mut conn = self.session.acquire(&SchemaScope::Public).await?;
        // IF EXISTS: dropping an absent schema is success
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", name.quoted()))
            .execute(conn.as_mut())
            .await?;
        conn.release().await?;
        info!(schema = %name, "schema dropped");
        Ok(())
    }
}
