mod execution_repository;
mod membership_repository;
mod schema_manager;
mod tenant_repository;

pub use execution_repository::PostgresExecutionLedgerRepository;
pub use membership_repository::PostgresMembershipRepository;
pub use schema_manager::PostgresSchemaManager;
pub use tenant_repository::PostgresTenantRepository;
