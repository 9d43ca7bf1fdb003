//! API-facing service behavior: registration, deletion requests, retries.

mod common;

use common::Harness;
use tenantd_domain::{ExecutionStatus, TenantStatus, WorkflowType};
use tenantd_errors::TenantError;
use uuid::Uuid;

#[tokio::test]
async fn registration_commits_row_then_dispatches() {
    let h = Harness::new();
    let service = h.service();

    let tenant = service
        .register_tenant("Acme Corp", "Acme-Corp", Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(tenant.status, TenantStatus::Provisioning);
    assert!(!tenant.is_active);
    assert_eq!(tenant.slug, "acme_corp");
    assert_eq!(tenant.schema_name, "tenant_acme_corp");

    let dispatches = h.dispatcher.dispatches();
    assert_eq!(dispatches.len(), 1);
    let (message, route) = &dispatches[0];
    assert_eq!(message.workflow, WorkflowType::TenantProvisioning);
    assert_eq!(message.tenant_id, tenant.id);
    assert_eq!(route.queue_name, "tenantd.provisioning");
    assert_eq!(route.fairness_weight, 1);

    let runs = h.ledger.all();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ExecutionStatus::Pending);
    assert_eq!(runs[0].run_id, message.run_id);
}

#[tokio::test]
async fn normalized_slug_collision_is_rejected() {
    let h = Harness::new();
    let service = h.service();

    service
        .register_tenant("Acme", "acme-corp", Uuid::new_v4())
        .await
        .unwrap();
    // normalizes to the same schema name as the first
    let err = service
        .register_tenant("Other Acme", "Acme_Corp", Uuid::new_v4())
        .await
        .unwrap_err();

    match err {
        TenantError::SlugConflict { schema_name } => {
            assert_eq!(schema_name, "tenant_acme_corp");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.tenants.count(), 1);
    assert_eq!(h.dispatcher.count(), 1);
}

#[tokio::test]
async fn invalid_slug_creates_nothing() {
    let h = Harness::new();
    let service = h.service();

    let err = service
        .register_tenant("Evil", "acme;drop schema public", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, TenantError::Validation(_)));
    assert_eq!(h.tenants.count(), 0);
    assert_eq!(h.ledger.all().len(), 0);
    assert_eq!(h.dispatcher.count(), 0);
}

#[tokio::test]
async fn dispatch_failure_still_registers_the_tenant() {
    let h = Harness::new();
    h.dispatcher.fail_times(1);
    let service = h.service();

    let tenant = service
        .register_tenant("Acme", "acme", Uuid::new_v4())
        .await
        .unwrap();

    // the row and the pending run survive; the sweeper owns recovery
    assert_eq!(tenant.status, TenantStatus::Provisioning);
    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(h.ledger.all().len(), 1);
    assert_eq!(h.ledger.all()[0].status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn deletion_is_rejected_while_provisioning() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Provisioning);
    let service = h.service();

    let err = service.request_deletion(tenant.id).await.unwrap_err();
    assert!(matches!(err, TenantError::InvalidStateTransition { .. }));
    assert_eq!(h.dispatcher.count(), 0);
    assert_eq!(h.tenants.get(tenant.id).unwrap().status, TenantStatus::Provisioning);
}

#[tokio::test]
async fn deletion_dispatches_for_ready_and_failed_tenants() {
    let h = Harness::new();
    let ready = h.seed_tenant("acme", TenantStatus::Ready);
    let failed = h.seed_tenant("umbrella", TenantStatus::Failed);
    let service = h.service();

    service.request_deletion(ready.id).await.unwrap();
    service.request_deletion(failed.id).await.unwrap();

    let dispatches = h.dispatcher.dispatches();
    assert_eq!(dispatches.len(), 2);
    assert!(dispatches
        .iter()
        .all(|(m, r)| m.workflow == WorkflowType::TenantDeprovisioning
            && r.queue_name == "tenantd.deprovisioning"));
}

#[tokio::test]
async fn deletion_of_deleted_tenant_is_rejected() {
    let h = Harness::new();
    let tenant = h.seed_tenant("acme", TenantStatus::Deleted);
    let service = h.service();

    let err = service.request_deletion(tenant.id).await.unwrap_err();
    assert!(matches!(err, TenantError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn retry_requires_failed_status() {
    let h = Harness::new();
    let ready = h.seed_tenant("acme", TenantStatus::Ready);
    let failed = h.seed_tenant("umbrella", TenantStatus::Failed);
    let service = h.service();

    let err = service.retry_provisioning(ready.id).await.unwrap_err();
    assert!(matches!(err, TenantError::InvalidStateTransition { .. }));

    service.retry_provisioning(failed.id).await.unwrap();
    assert_eq!(
        h.tenants.get(failed.id).unwrap().status,
        TenantStatus::Provisioning
    );
    let dispatches = h.dispatcher.dispatches();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].0.workflow, WorkflowType::TenantProvisioning);
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let h = Harness::new();
    let service = h.service();
    let id = Uuid::new_v4();

    assert!(matches!(
        service.get_status(id).await.unwrap_err(),
        TenantError::TenantNotFound { .. }
    ));
    assert!(matches!(
        service.list_executions(id).await.unwrap_err(),
        TenantError::TenantNotFound { .. }
    ));
}

#[tokio::test]
async fn execution_history_lists_runs_for_tenant() {
    let h = Harness::new();
    let service = h.service();
    let tenant = service
        .register_tenant("Acme", "acme", Uuid::new_v4())
        .await
        .unwrap();
    h.seed_tenant("other", TenantStatus::Ready);

    let history = service.list_executions(tenant.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tenant_id, tenant.id);
}
