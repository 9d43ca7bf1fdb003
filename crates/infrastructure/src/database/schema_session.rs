use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPool;
use sqlx::{PgConnection, Postgres};
use tenantd_domain::SchemaName;
use tenantd_errors::{TenantError, TenantResult};
use tracing::{debug, warn};

/// Execution context a session is bound to: exactly one tenant schema, or
/// the shared public schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaScope {
    Public,
    Tenant(SchemaName),
}

impl SchemaScope {
    /// The search_path for this scope. Tenant scope lists only the tenant
    /// schema — no public fallback, so a missing tenant table fails loudly
    /// instead of silently reading shared tables.
    fn search_path(&self) -> String {
        match self {
            SchemaScope::Public => "public".to_string(),
            SchemaScope::Tenant(name) => name.quoted(),
        }
    }
}

impl std::fmt::Display for SchemaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaScope::Public => f.write_str("public"),
            SchemaScope::Tenant(name) => write!(f, "{name}"),
        }
    }
}

/// Per-operation database access bound to exactly one schema.
///
/// The acquire/release discipline here is the only sanctioned way to change
/// which tenant a pooled connection "belongs to". Public scope explicitly
/// re-asserts `public` rather than trusting pool-returned state.
#[derive(Clone)]
pub struct SchemaSession {
    pool: PgPool,
}

impl SchemaSession {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Acquires a connection with its search_path switched to `scope`.
    ///
    /// If the context switch fails, acquisition aborts and the connection
    /// is detached from the pool (closed, never reused) — a session with
    /// ambiguous context is never yielded.
    pub async fn acquire(&self, scope: &SchemaScope) -> TenantResult<ScopedConnection> {
        let mut conn = self.pool.acquire().await?;
        let stmt = format!("SET search_path TO {}", scope.search_path());
        if let Err(e) = sqlx::query(&stmt).execute(&mut *conn).await {
            drop(conn.detach());
            return Err(TenantError::SchemaContext(format!(
                "failed to switch to schema context {scope}: {e}"
            )));
        }
        debug!(%scope, "schema context acquired");
        Ok(ScopedConnection { conn: Some(conn) })
    }
}

/// Connection guard holding a schema-scoped pooled connection.
///
/// `release` resets the search_path before the connection re-enters the
/// pool. On every other path — reset failure, error, panic, forgotten
/// release — `Drop` detaches the connection so residual tenant context can
/// never leak into a later acquisition.
pub struct ScopedConnection {
    conn: Option<PoolConnection<Postgres>>,
}

impl ScopedConnection {
    /// The underlying connection. Invariant: `conn` is `Some` until
    /// `release` consumes the guard, so this cannot fail before then.
    pub fn as_mut(&mut self) -> &mut PgConnection {
        self.conn
            .as_deref_mut()
            .expect("scoped connection used after release")
    }

    /// Reverts the schema context and returns the connection to the pool.
    pub async fn release(mut self) -> TenantResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        match sqlx::query("SET search_path TO public")
            .execute(&mut *conn)
            .await
        {
            Ok(_) => {
                // clean; dropping the PoolConnection returns it to the pool
                drop(conn);
                Ok(())
            }
            Err(e) => {
                warn!("search_path reset failed, discarding connection: {e}");
                drop(conn.detach());
                Err(TenantError::SchemaContext(format!(
                    "failed to reset schema context: {e}"
                )))
            }
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Not released: the connection still carries tenant context.
            // Detach it so it closes instead of going back to the pool.
            warn!("scoped connection dropped without release, discarding");
            drop(conn.detach());
        }
    }
}
