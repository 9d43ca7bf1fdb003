use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tenantd_errors::{TenantError, TenantResult};
use tracing::info;

/// Registry migrations, applied to the public schema at startup.
pub static REGISTRY_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Per-tenant migrations, applied by the provisioning saga inside each
/// tenant schema.
pub static TENANT_MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./tenant_migrations");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/tenantd".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
            idle_timeout_seconds: 600,
        }
    }
}

/// Builds the shared connection pool. Constructed once at the composition
/// root and injected; nothing reads a module-level global.
///
/// Server-side prepared-statement caching is disabled for every pooled
/// connection: a statement compiled under one tenant's search_path must
/// never execute against a connection later bound to another tenant.
pub async fn create_pool(config: &DatabaseConfig) -> TenantResult<PgPool> {
    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| TenantError::config_error(format!("invalid database url: {e}")))?
        .statement_cache_capacity(0);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await?;

    info!(
        max_connections = config.max_connections,
        "database connection pool created"
    );
    Ok(pool)
}

/// Applies the registry migrations to the public schema.
pub async fn run_registry_migrations(pool: &PgPool) -> TenantResult<()> {
    REGISTRY_MIGRATOR
        .run(pool)
        .await
        .map_err(|e| TenantError::Migration(format!("registry migrations failed: {e}")))?;
    info!("registry migrations applied");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> TenantResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
