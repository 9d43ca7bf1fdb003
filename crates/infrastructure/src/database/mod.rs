pub mod manager;
pub mod pg_errors;
pub mod postgres;
pub mod schema_session;

pub use manager::{create_pool, health_check, run_registry_migrations, DatabaseConfig};
pub use schema_session::{SchemaScope, SchemaSession, ScopedConnection};
