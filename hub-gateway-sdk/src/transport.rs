use crate::{
    CloudMessage, DeviceCredentials, InboundMessage, MethodHandler, PoolingOptions, TransportResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One authenticated connection to the backend on behalf of one device.
///
/// Implementations multiplex many sessions over shared physical connections,
/// but each session carries its own identity and credentials. All operations
/// stay valid until [`close`](Self::close); afterwards they fail with
/// [`TransportError::Closed`](crate::TransportError::Closed).
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Forward one device-to-cloud message.
    async fn send(&self, message: CloudMessage) -> TransportResult<()>;

    /// Wait up to `wait` for one cloud-to-device message.
    ///
    /// `Ok(None)` means the queue was empty within the bound; it is the
    /// common case and not an error.
    async fn receive(&self, wait: Duration) -> TransportResult<Option<InboundMessage>>;

    /// Settle a received message as consumed.
    async fn ack(&self, message: &InboundMessage) -> TransportResult<()>;

    /// Settle a received message as not consumed so the backend may
    /// redeliver it.
    async fn reject(&self, message: &InboundMessage) -> TransportResult<()>;

    /// Install the handler invoked for direct method calls on this device.
    async fn register_method_handler(&self, handler: MethodHandler) -> TransportResult<()>;

    /// Release the session. Idempotent.
    async fn close(&self) -> TransportResult<()>;
}

/// Factory for [`TransportSession`]s.
///
/// `endpoint` is the backend endpoint name, empty when the credentials carry
/// the endpoint themselves (connection string).
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn open(
        &self,
        endpoint: &str,
        device_id: &str,
        credentials: DeviceCredentials,
        pooling: PoolingOptions,
    ) -> TransportResult<Arc<dyn TransportSession>>;
}
