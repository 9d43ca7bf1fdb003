use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lapin::{options::*, Channel, Connection, ConnectionProperties};
use tenantd_domain::WorkflowMessage;
use tenantd_errors::{TenantError, TenantResult};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{MessageQueueConfig, RabbitMqDispatcher};

/// Handler a worker process registers for the workflows it serves.
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn handle(&self, message: WorkflowMessage) -> TenantResult<()>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Polling consumer for a set of sharded work queues.
///
/// Delivery is at-least-once: a message is acked only after the handler
/// returns. Retryable handler errors requeue the delivery for another
/// attempt; non-retryable ones ack it, because the saga has already
/// recorded its terminal failure and compensated.
pub struct WorkflowWorker {
    connection: Connection,
    channel: Channel,
    queues: Vec<String>,
    handler: Arc<dyn WorkflowHandler>,
    config: WorkerConfig,
}

impl WorkflowWorker {
    pub async fn connect(
        mq: &MessageQueueConfig,
        queues: Vec<String>,
        handler: Arc<dyn WorkflowHandler>,
        config: WorkerConfig,
    ) -> TenantResult<Self> {
        if queues.is_empty() {
            return Err(TenantError::config_error(
                "worker must serve at least one queue",
            ));
        }
        let connection = Connection::connect(&mq.url, ConnectionProperties::default())
            .await
            .map_err(|e| {
                TenantError::message_queue_error(format!("failed to connect to RabbitMQ: {e}"))
            })?;
        let channel = connection.create_channel().await.map_err(|e| {
            TenantError::message_queue_error(format!("failed to create channel: {e}"))
        })?;

        // register the queues this worker serves up front
        for queue in &queues {
            RabbitMqDispatcher::declare_queue(&channel, queue).await?;
        }
        info!(queues = ?queues, "workflow worker registered");

        Ok(Self {
            connection,
            channel,
            queues,
            handler,
            config,
        })
    }

    /// Polls the registered queues until shutdown is signalled.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> TenantResult<()> {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("workflow worker shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    for queue in &self.queues {
                        if let Err(e) = self.poll_queue(queue).await {
                            error!(queue, "queue poll failed: {e}");
                        }
                    }
                }
            }
        }
    }

    async fn poll_queue(&self, queue: &str) -> TenantResult<()> {
        let delivery = self
            .channel
            .basic_get(queue, BasicGetOptions::default())
            .await
            .map_err(|e| {
                TenantError::message_queue_error(format!("basic_get on {queue} failed: {e}"))
            })?;

        let Some(delivery) = delivery else {
            return Ok(());
        };

        let message: WorkflowMessage = match serde_json::from_slice(&delivery.data) {
            Ok(msg) => msg,
            Err(e) => {
                // poison message: ack it away, it can never succeed
                warn!(queue, "dropping undecodable message: {e}");
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .map_err(|e| TenantError::message_queue_error(format!("ack failed: {e}")))?;
                return Ok(());
            }
        };

        debug!(run_id = %message.run_id, workflow = %message.workflow, queue, "message received");

        match self.handler.handle(message).await {
            Ok(()) => {
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .map_err(|e| TenantError::message_queue_error(format!("ack failed: {e}")))?;
            }
            Err(e) if e.is_retryable() => {
                warn!(queue, "handler failed transiently, requeueing: {e}");
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| TenantError::message_queue_error(format!("nack failed: {e}")))?;
            }
            Err(e) => {
                // terminal saga failure was already recorded in the ledger
                warn!(queue, "handler failed terminally, acking: {e}");
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .map_err(|e| TenantError::message_queue_error(format!("ack failed: {e}")))?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) -> TenantResult<()> {
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| TenantError::message_queue_error(format!("failed to close: {e}")))?;
        Ok(())
    }
}
