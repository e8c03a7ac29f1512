use crate::{
    CloudMessage, DeviceCredentials, InboundMessage, MethodHandler, MethodRequest, MethodResult,
    PoolingOptions, TransportConnector, TransportError, TransportResult, TransportSession,
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use hub_gateway_models::device_identity;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

/// In-memory transport used by tests and local development runs.
///
/// Queues are keyed by device identity and shared by every session opened for
/// the same device, so a caller can inspect what a cached session sent and
/// feed it inbound messages.
#[derive(Default)]
pub struct LoopbackConnector {
    queues: DashMap<String, Arc<DeviceQueues>>,
    opened: AtomicUsize,
}

#[derive(Default)]
struct DeviceQueues {
    inbound: Mutex<VecDeque<InboundMessage>>,
    unsettled: Mutex<Vec<InboundMessage>>,
    outbound: Mutex<Vec<CloudMessage>>,
    method_handler: Mutex<Option<MethodHandler>>,
    arrived: Notify,
    closes: AtomicUsize,
}

impl LoopbackConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened so far, across all devices.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far for one device.
    pub fn close_count(&self, endpoint: &str, device_id: &str) -> usize {
        self.device_queues(endpoint, device_id)
            .map_or(0, |queues| queues.closes.load(Ordering::SeqCst))
    }

    /// Device-to-cloud messages recorded so far, oldest first.
    pub async fn outbound(&self, endpoint: &str, device_id: &str) -> Vec<CloudMessage> {
        match self.device_queues(endpoint, device_id) {
            Some(queues) => queues.outbound.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Queue one cloud-to-device message and wake any bounded-wait receive.
    /// Returns the generated message id.
    pub async fn push_inbound(
        &self,
        endpoint: &str,
        device_id: &str,
        body: impl Into<Bytes>,
    ) -> String {
        let queues = self
            .queues
            .entry(Self::key(endpoint, device_id))
            .or_default()
            .value()
            .clone();
        let id = Uuid::new_v4().to_string();
        queues.inbound.lock().await.push_back(InboundMessage {
            id: id.clone(),
            body: body.into(),
        });
        queues.arrived.notify_one();
        id
    }

    /// Cloud-to-device messages not yet received.
    pub async fn queued_count(&self, endpoint: &str, device_id: &str) -> usize {
        match self.device_queues(endpoint, device_id) {
            Some(queues) => queues.inbound.lock().await.len(),
            None => 0,
        }
    }

    /// Messages received but neither acknowledged nor rejected.
    pub async fn unsettled_count(&self, endpoint: &str, device_id: &str) -> usize {
        match self.device_queues(endpoint, device_id) {
            Some(queues) => queues.unsettled.lock().await.len(),
            None => 0,
        }
    }

    /// Invoke the device's registered direct method handler, if any.
    pub async fn call_method(
        &self,
        endpoint: &str,
        device_id: &str,
        request: MethodRequest,
    ) -> Option<MethodResult> {
        let queues = self.device_queues(endpoint, device_id)?;
        let handler = (*queues.method_handler.lock().await).clone()?;
        Some((handler.as_ref())(endpoint, device_id, request).await)
    }

    fn device_queues(&self, endpoint: &str, device_id: &str) -> Option<Arc<DeviceQueues>> {
        self.queues
            .get(&Self::key(endpoint, device_id))
            .map(|entry| entry.value().clone())
    }

    fn key(endpoint: &str, device_id: &str) -> String {
        device_identity((!endpoint.is_empty()).then_some(endpoint), device_id)
    }
}

#[async_trait]
impl TransportConnector for LoopbackConnector {
    async fn open(
        &self,
        endpoint: &str,
        device_id: &str,
        credentials: DeviceCredentials,
        pooling: PoolingOptions,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        if device_id.trim().is_empty() {
            return Err(TransportError::OpenFailed {
                identity: device_id.to_owned(),
                reason: "device id must not be empty".into(),
            });
        }
        let identity = Self::key(endpoint, device_id);
        let queues = self
            .queues
            .entry(identity.clone())
            .or_default()
            .value()
            .clone();
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!(
            identity = %identity,
            credentials = ?credentials,
            max_pool_size = pooling.max_pool_size,
            "opened loopback session"
        );
        Ok(Arc::new(LoopbackSession {
            identity,
            queues,
            closed: AtomicBool::new(false),
        }))
    }
}

struct LoopbackSession {
    identity: String,
    queues: Arc<DeviceQueues>,
    closed: AtomicBool,
}

impl LoopbackSession {
    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed {
                identity: self.identity.clone(),
            });
        }
        Ok(())
    }

    fn settle_failed(&self, message: &InboundMessage) -> TransportError {
        TransportError::SettleFailed {
            identity: self.identity.clone(),
            reason: format!("unknown message id '{}'", message.id),
        }
    }
}

#[async_trait]
impl TransportSession for LoopbackSession {
    async fn send(&self, message: CloudMessage) -> TransportResult<()> {
        self.ensure_open()?;
        self.queues.outbound.lock().await.push(message);
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> TransportResult<Option<InboundMessage>> {
        self.ensure_open()?;
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(message) = self.queues.inbound.lock().await.pop_front() {
                self.queues.unsettled.lock().await.push(message.clone());
                return Ok(Some(message));
            }
            if tokio::time::timeout_at(deadline, self.queues.arrived.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn ack(&self, message: &InboundMessage) -> TransportResult<()> {
        self.ensure_open()?;
        let mut unsettled = self.queues.unsettled.lock().await;
        let index = unsettled
            .iter()
            .position(|m| m.id == message.id)
            .ok_or_else(|| self.settle_failed(message))?;
        unsettled.remove(index);
        Ok(())
    }

    async fn reject(&self, message: &InboundMessage) -> TransportResult<()> {
        self.ensure_open()?;
        let requeued = {
            let mut unsettled = self.queues.unsettled.lock().await;
            let index = unsettled
                .iter()
                .position(|m| m.id == message.id)
                .ok_or_else(|| self.settle_failed(message))?;
            unsettled.remove(index)
        };
        self.queues.inbound.lock().await.push_front(requeued);
        self.queues.arrived.notify_one();
        Ok(())
    }

    async fn register_method_handler(&self, handler: MethodHandler) -> TransportResult<()> {
        self.ensure_open()?;
        *self.queues.method_handler.lock().await = Some(handler);
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.queues.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
