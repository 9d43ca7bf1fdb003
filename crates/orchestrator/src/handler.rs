use std::sync::Arc;

use async_trait::async_trait;
use tenantd_domain::{WorkflowMessage, WorkflowType};
use tenantd_errors::TenantResult;
use tenantd_infrastructure::WorkflowHandler;

use crate::deprovisioning::DeprovisioningOrchestrator;
use crate::provisioning::ProvisioningOrchestrator;

/// Routes dequeued workflow messages to the orchestrator for their type.
pub struct OrchestratorHandler {
    provisioning: Arc<ProvisioningOrchestrator>,
    deprovisioning: Arc<DeprovisioningOrchestrator>,
}

impl OrchestratorHandler {
    pub fn new(
        provisioning: Arc<ProvisioningOrchestrator>,
        deprovisioning: Arc<DeprovisioningOrchestrator>,
    ) -> Self {
        Self {
            provisioning,
            deprovisioning,
        }
    }
}

#[async_trait]
impl WorkflowHandler for OrchestratorHandler {
    async fn handle(&self, message: WorkflowMessage) -> TenantResult<()> {
        match message.workflow {
            WorkflowType::TenantProvisioning => {
                self.provisioning
                    .run(&message.run_id, message.tenant_id)
                    .await
            }
            WorkflowType::TenantDeprovisioning => {
                self.deprovisioning
                    .run(&message.run_id, message.tenant_id)
                    .await
            }
        }
    }
}
