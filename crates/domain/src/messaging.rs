use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::WorkflowType;

/// Wire message dispatched to a sharded work queue.
///
/// Carries only identities: workers re-load the tenant row (and re-validate
/// its slug) instead of trusting state serialized before the suspension
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowMessage {
    pub run_id: String,
    pub workflow: WorkflowType,
    pub tenant_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

impl WorkflowMessage {
    pub fn new(run_id: String, workflow: WorkflowType, tenant_id: Uuid) -> Self {
        Self {
            run_id,
            workflow,
            tenant_id,
            enqueued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_stable_wire_names() {
        let msg = WorkflowMessage::new(
            "run-1".into(),
            WorkflowType::TenantProvisioning,
            Uuid::new_v4(),
        );
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("TENANT_PROVISIONING"));
        let back: WorkflowMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
