use crate::{DeviceConnectionCache, DeviceRegistry, PollOutcome};
use futures::stream::{self, StreamExt};
use hub_gateway_models::SettingsInner;
use hub_gateway_sdk::CloudMessageHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for the background scan.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Sessions polled concurrently within one pass.
    pub parallelism: usize,
    /// Per-device receive wait bound.
    pub receive_wait: Duration,
    /// Delay between passes over a non-empty registry.
    pub pass_delay: Duration,
    /// Delay after a pass over an empty registry.
    pub idle_delay: Duration,
}

impl PollerConfig {
    pub fn from_settings(settings: &SettingsInner) -> Self {
        Self {
            parallelism: settings.cloud_messages.parallelism,
            receive_wait: Duration::from_millis(settings.cloud_messages.receive_wait_ms),
            pass_delay: Duration::from_millis(settings.cloud_messages.pass_delay_ms),
            idle_delay: Duration::from_millis(settings.cloud_messages.idle_delay_ms),
        }
    }
}

/// Background task that continuously drains inbound messages for every
/// registered device.
///
/// Each pass snapshots the registry and polls the listed identities with
/// bounded parallelism. Per-identity failures are logged and never abort the
/// pass or the loop. On stop the in-flight pass finishes its short receive
/// waits naturally instead of being cancelled mid-receive.
pub struct CloudMessagePoller {
    inner: Arc<PollerInner>,
    task: RwLock<Option<JoinHandle<()>>>,
}

struct PollerInner {
    cache: Arc<DeviceConnectionCache>,
    registry: DeviceRegistry,
    handler: CloudMessageHandler,
    config: PollerConfig,
    shutdown: CancellationToken,
}

impl CloudMessagePoller {
    pub fn new(
        cache: Arc<DeviceConnectionCache>,
        registry: DeviceRegistry,
        handler: CloudMessageHandler,
        config: PollerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                cache,
                registry,
                handler,
                config,
                shutdown: CancellationToken::new(),
            }),
            task: RwLock::new(None),
        }
    }

    /// Spawn the scan loop. A second call while running is a no-op.
    pub async fn start(&self) {
        let mut slot = self.task.write().await;
        if slot.is_some() {
            warn!("cloud message poller already running");
            return;
        }
        let inner = self.inner.clone();
        *slot = Some(tokio::spawn(async move { inner.run().await }));
        info!(
            parallelism = self.inner.config.parallelism,
            "cloud message poller started"
        );
    }

    /// Signal the loop to stop and wait for the in-flight pass to finish.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        let handle = self.task.write().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(error = %err, "cloud message poller task failed");
            }
        }
        info!("cloud message poller stopped");
    }
}

impl PollerInner {
    async fn run(self: Arc<Self>) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let identities = self.registry.snapshot();
            if identities.is_empty() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.idle_delay) => {}
                }
                continue;
            }

            let scanned = identities.len();
            let delivered = stream::iter(identities)
                .map(|identity| self.poll_one(identity))
                .buffer_unordered(self.config.parallelism.max(1))
                .fold(0_usize, |count, delivered| async move {
                    count + usize::from(delivered)
                })
                .await;
            if delivered > 0 {
                debug!(scanned, delivered, "poll pass finished");
            }

            if !self.config.pass_delay.is_zero() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.pass_delay) => {}
                }
            }
            // passes run back to back when no delay is configured
            tokio::task::yield_now().await;
        }
        debug!("cloud message poller loop exited");
    }

    async fn poll_one(&self, identity: String) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        // evicted between snapshot and lookup: expected, skip quietly
        let Some(session) = self.cache.get(&identity).await else {
            return false;
        };
        match session
            .poll_and_forward(self.config.receive_wait, &self.handler)
            .await
        {
            Ok(PollOutcome::Delivered) => true,
            Ok(PollOutcome::Empty | PollOutcome::Skipped) => false,
            Err(err) => {
                warn!(identity = %identity, error = %err, "cloud message poll failed");
                false
            }
        }
    }
}
