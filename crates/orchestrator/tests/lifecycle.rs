//! End-to-end lifecycle scenarios over the in-memory infrastructure.

mod common;

use common::{run_id, Harness};
use tenantd_domain::{ExecutionStatus, TenantStatus};
use tenantd_orchestrator::SEED_MEMBERSHIP_ROLE;

#[tokio::test]
async fn provisioning_happy_path_ends_ready() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);
    let rid = run_id();

    h.provisioner().run(&rid, tenant.id).await.unwrap();

    let after = h.tenants.get(tenant.id).unwrap();
    assert_eq!(after.status, TenantStatus::Ready);
    assert!(after.is_active);
    assert!(after.deleted_at.is_none());

    assert!(h.schemas.schema_exists("tenant_acme"));
    assert_eq!(
        h.schemas.calls(),
        vec!["create:tenant_acme", "migrate:tenant_acme"]
    );

    let memberships = h.memberships.all();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].user_id, tenant.owner_user_id);
    assert_eq!(memberships[0].role, SEED_MEMBERSHIP_ROLE);

    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn migration_failure_compensates_and_ends_failed() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);
    // more failures than the retry budget: the step fails hard
    h.schemas.fail_times("run_migrations", 10);
    let rid = run_id();

    h.provisioner().run(&rid, tenant.id).await.unwrap_err();

    let after = h.tenants.get(tenant.id).unwrap();
    assert_eq!(after.status, TenantStatus::Failed);
    assert!(!after.is_active);

    // the created schema was rolled back by the compensation pass
    assert!(!h.schemas.schema_exists("tenant_acme"));
    assert_eq!(
        h.schemas.calls(),
        vec!["create:tenant_acme", "drop:tenant_acme"]
    );
    // the membership step never ran, so nothing to undo
    assert_eq!(h.memberships.count(), 0);
    assert_eq!(h.notifier.sent().len(), 0);

    let run = h.ledger.get(&rid).unwrap();
    assert_eq!(run.status, ExecutionStatus::Failed);
    assert!(run.error_message.is_some());
}

#[tokio::test]
async fn transient_schema_failure_recovers_within_retry_budget() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);
    h.schemas.fail_times("create_schema", 2);
    let rid = run_id();

    h.provisioner().run(&rid, tenant.id).await.unwrap();

    assert_eq!(h.tenants.get(tenant.id).unwrap().status, TenantStatus::Ready);
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn replayed_provisioning_does_not_duplicate_membership() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);

    h.provisioner().run(&run_id(), tenant.id).await.unwrap();
    // a second delivery of the same work arrives after the first completed;
    // the identity Ready -> Ready transition and the existing membership
    // row must both be treated as success
    h.provisioner().run(&run_id(), tenant.id).await.unwrap();

    assert_eq!(h.memberships.count(), 1);
    assert_eq!(h.tenants.get(tenant.id).unwrap().status, TenantStatus::Ready);
}

#[tokio::test]
async fn welcome_notification_failure_is_best_effort() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);
    h.notifier.fail_times(10);
    let rid = run_id();

    h.provisioner().run(&rid, tenant.id).await.unwrap();

    assert_eq!(h.tenants.get(tenant.id).unwrap().status, TenantStatus::Ready);
    assert_eq!(h.notifier.sent().len(), 0);
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn unknown_tenant_fails_without_side_effects() {
    let h = Harness::new();
    let rid = run_id();

    let err = h
        .provisioner()
        .run(&rid, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tenant not found"));

    assert!(h.schemas.calls().is_empty());
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn deprovisioning_drops_schema_and_ends_deleted() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);
    h.provisioner().run(&run_id(), tenant.id).await.unwrap();
    assert!(h.schemas.schema_exists("tenant_acme"));

    let rid = run_id();
    h.deprovisioner().run(&rid, tenant.id).await.unwrap();

    let after = h.tenants.get(tenant.id).unwrap();
    assert_eq!(after.status, TenantStatus::Deleted);
    assert!(!after.is_active);
    assert!(after.deleted_at.is_some());
    assert!(!h.schemas.schema_exists("tenant_acme"));
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn failed_drop_leaves_tenant_fenced_in_deleting() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Ready);
    h.schemas.fail_times("drop_schema", 10);
    let rid = run_id();

    h.deprovisioner().run(&rid, tenant.id).await.unwrap_err();

    // stays fenced off for the sweeper to re-drive, never rolls back
    let after = h.tenants.get(tenant.id).unwrap();
    assert_eq!(after.status, TenantStatus::Deleting);
    assert!(!after.is_active);
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn replayed_deprovisioning_completes_after_deletion() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Ready);
    h.deprovisioner().run(&run_id(), tenant.id).await.unwrap();

    let rid = run_id();
    h.deprovisioner().run(&rid, tenant.id).await.unwrap();

    assert_eq!(h.tenants.get(tenant.id).unwrap().status, TenantStatus::Deleted);
    assert_eq!(h.ledger.get(&rid).unwrap().status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn deprovisioning_of_failed_tenant_is_allowed() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Failed);

    h.deprovisioner().run(&run_id(), tenant.id).await.unwrap();

    assert_eq!(h.tenants.get(tenant.id).unwrap().status, TenantStatus::Deleted);
}
