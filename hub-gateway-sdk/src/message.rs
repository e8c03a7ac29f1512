use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Device-to-cloud message as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudMessage {
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: String,
}

/// Cloud-to-device message pulled off the backend queue.
///
/// The `id` is the settlement handle: `ack` and `reject` address the
/// message by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub body: Bytes,
}

/// Direct method invocation arriving from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRequest {
    pub method_name: String,
    pub payload: Bytes,
}

/// Reply returned to the backend for a direct method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodResponse {
    pub status: u16,
    pub payload: Bytes,
}

impl MethodResponse {
    /// Empty 200 reply.
    pub fn ok() -> Self {
        Self {
            status: 200,
            payload: Bytes::new(),
        }
    }
}

pub type HandlerResult = Result<(), anyhow::Error>;
pub type MethodResult = Result<MethodResponse, anyhow::Error>;

/// Callback invoked with `(endpoint_name, device_id, message)` for every
/// inbound message the poller drains. An `Err` rejects the message so the
/// backend may redeliver it.
pub type CloudMessageHandler = Arc<
    dyn Fn(&str, &str, InboundMessage) -> Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>>
        + Send
        + Sync,
>;

/// Callback invoked with `(endpoint_name, device_id, request)` for direct
/// method calls; the returned response travels back to the backend.
pub type MethodHandler = Arc<
    dyn Fn(&str, &str, MethodRequest) -> Pin<Box<dyn Future<Output = MethodResult> + Send + 'static>>
        + Send
        + Sync,
>;
