use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tenantd_infrastructure::{DatabaseConfig, MessageQueueConfig, QueueRouterConfig};
use tenantd_orchestrator::SweeperConfig;

/// Top-level configuration, loaded from a TOML file with `TENANTD__`
/// environment overrides (e.g. `TENANTD__DATABASE__URL`).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub message_queue: MessageQueueConfig,
    pub queue_router: QueueRouterConfig,
    pub sweeper: SweeperSettings,
    pub worker: WorkerSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweeperSettings {
    pub interval_seconds: u64,
    pub provisioning_grace_seconds: u64,
    pub running_staleness_seconds: u64,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            provisioning_grace_seconds: 300,
            running_staleness_seconds: 900,
        }
    }
}

impl From<&SweeperSettings> for SweeperConfig {
    fn from(s: &SweeperSettings) -> Self {
        Self {
            interval: Duration::from_secs(s.interval_seconds),
            provisioning_grace: Duration::from_secs(s.provisioning_grace_seconds),
            running_staleness: Duration::from_secs(s.running_staleness_seconds),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub poll_interval_seconds: u64,
    /// Shards this worker consumes. Empty means all shards.
    pub shards: Vec<u32>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 1,
            shards: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub bind_address: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix("TENANTD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}
