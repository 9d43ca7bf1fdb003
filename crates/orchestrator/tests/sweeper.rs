//! Reconciliation sweeper scenarios.

mod common;

use std::time::Duration;

use common::Harness;
use tenantd_domain::{ExecutionStatus, TenantStatus, WorkflowType};
use tenantd_orchestrator::SweeperConfig;
use tenantd_testing_utils::{ExecutionBuilder, TenantBuilder};

fn config() -> SweeperConfig {
    SweeperConfig {
        interval: Duration::from_secs(60),
        provisioning_grace: Duration::from_secs(300),
        running_staleness: Duration::from_secs(900),
    }
}

#[tokio::test]
async fn stuck_provisioning_tenant_is_redispatched() {
    let h = Harness::new();
    let tenant = TenantBuilder::new()
        .with_slug("acme")
        .with_status(TenantStatus::Provisioning)
        .updated_secs_ago(600)
        .build();
    h.tenants.insert(tenant.clone());

    let report = h.sweeper(config()).sweep_once().await.unwrap();

    assert_eq!(report.stuck_tenants, 1);
    assert_eq!(report.stale_runs, 0);
    let dispatches = h.dispatcher.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].0.workflow, WorkflowType::TenantProvisioning);
    assert_eq!(dispatches[0].0.tenant_id, tenant.id);
}

#[tokio::test]
async fn fresh_provisioning_tenant_is_left_alone() {
    let h = Harness::new();
    h.seed_tenant("acme", TenantStatus::Provisioning);

    let report = h.sweeper(config()).sweep_once().await.unwrap();

    assert_eq!(report.stuck_tenants, 0);
    assert_eq!(h.dispatcher.count(), 0);
}

#[tokio::test]
async fn tenant_with_running_provisioning_is_not_stuck() {
    let h = Harness::new();
    let tenant = TenantBuilder::new()
        .with_slug("acme")
        .with_status(TenantStatus::Provisioning)
        .updated_secs_ago(600)
        .build();
    h.tenants.insert(tenant.clone());
    h.ledger.insert(
        ExecutionBuilder::new()
            .with_tenant(tenant.id)
            .with_status(ExecutionStatus::Running)
            .build(),
    );

    let report = h.sweeper(config()).sweep_once().await.unwrap();

    assert_eq!(report.stuck_tenants, 0);
}

#[tokio::test]
async fn stale_running_run_is_failed_and_redispatched_exactly_once() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Deleting);
    h.ledger.insert(
        ExecutionBuilder::new()
            .with_run_id("stale-run")
            .with_workflow(WorkflowType::TenantDeprovisioning)
            .with_tenant(tenant.id)
            .with_status(ExecutionStatus::Running)
            .started_secs_ago(1200)
            .build(),
    );

    let sweeper = h.sweeper(config());
    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.stale_runs, 1);
    // abandoned run is terminally failed before the replacement goes out
    let old = h.ledger.get("stale-run").unwrap();
    assert_eq!(old.status, ExecutionStatus::Failed);
    assert!(old.error_message.unwrap().contains("abandoned"));

    let dispatches = h.dispatcher.dispatches();
    assert_eq!(dispatches.len(), 1);
    // the replacement keeps the original workflow type and a fresh run id
    assert_eq!(dispatches[0].0.workflow, WorkflowType::TenantDeprovisioning);
    assert_ne!(dispatches[0].0.run_id, "stale-run");

    // a second pass finds nothing left to re-drive
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.stale_runs, 0);
    assert_eq!(h.dispatcher.count(), 1);
}

#[tokio::test]
async fn terminal_tenants_are_never_redispatched() {
    let h = Harness::new();
    let deleted = h.seed_tenant("acme", TenantStatus::Deleted);
    let failed = h.seed_tenant("umbrella", TenantStatus::Failed);
    for tenant in [&deleted, &failed] {
        h.ledger.insert(
            ExecutionBuilder::new()
                .with_tenant(tenant.id)
                .with_status(ExecutionStatus::Running)
                .started_secs_ago(1200)
                .build(),
        );
    }

    let report = h.sweeper(config()).sweep_once().await.unwrap();

    assert_eq!(report.stale_runs, 0);
    assert_eq!(h.dispatcher.count(), 0);
}

#[tokio::test]
async fn dispatch_failure_does_not_count_as_recovered() {
    let h = Harness::new();
    h.dispatcher.fail_times(1);
    let tenant = TenantBuilder::new()
        .with_slug("acme")
        .with_status(TenantStatus::Provisioning)
        .updated_secs_ago(600)
        .build();
    h.tenants.insert(tenant);

    let report = h.sweeper(config()).sweep_once().await.unwrap();

    assert_eq!(report.stuck_tenants, 0);
    assert_eq!(h.dispatcher.count(), 0);
}
