//! Tenant lifecycle orchestration: the provisioning saga, deprovisioning
//! sequence, retrying activities, the application service behind the API
//! and the reconciliation sweeper.

pub mod activities;
pub mod deprovisioning;
pub mod handler;
pub mod provisioning;
pub mod retry;
pub mod saga;
pub mod service;
pub mod sweeper;

pub use activities::{TenantActivities, SEED_MEMBERSHIP_ROLE};
pub use deprovisioning::DeprovisioningOrchestrator;
pub use handler::OrchestratorHandler;
pub use provisioning::ProvisioningOrchestrator;
pub use retry::RetryPolicy;
pub use saga::{step_fn, Saga, SagaStep, StepFn};
pub use service::TenantService;
pub use sweeper::{SweepReport, Sweeper, SweeperConfig};
