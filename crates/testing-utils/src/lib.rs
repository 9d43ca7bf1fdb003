//! In-memory test doubles and entity builders shared across the workspace's
//! test suites. No live Postgres or RabbitMQ is required anywhere in the
//! tests.

pub mod builders;
pub mod mocks;

pub use builders::{ExecutionBuilder, TenantBuilder};
pub use mocks::{
    InMemoryExecutionLedger, InMemoryMembershipRepository, InMemoryTenantRepository,
    RecordingDispatcher, RecordingNotifier, RecordingSchemaManager,
};
