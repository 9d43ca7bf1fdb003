use async_trait::async_trait;
use tenantd_domain::Notifier;
use tenantd_errors::TenantResult;
use tracing::info;
use uuid::Uuid;

/// Notification boundary stand-in: logs instead of delivering. Real
/// delivery lives outside this system; provisioning only needs the
/// best-effort call site.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send_welcome(&self, tenant_id: Uuid, tenant_name: &str) -> TenantResult<()> {
        info!(%tenant_id, tenant_name, "welcome notification queued");
        Ok(())
    }
}
