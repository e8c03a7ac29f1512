use crate::CircuitBreaker;
use bytes::Bytes;
use hub_gateway_error::{GatewayError, GatewayResult};
use hub_gateway_models::constants::{MESSAGE_CONTENT_ENCODING, MESSAGE_CONTENT_TYPE};
use hub_gateway_sdk::{CloudMessage, CloudMessageHandler, TransportSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of one poll attempt against a device's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// An inbound message was received, forwarded and acknowledged.
    Delivered,
    /// The queue stayed empty within the wait bound.
    Empty,
    /// The breaker is open; the transport was not touched.
    Skipped,
}

/// One device's live connection: a transport session paired with its own
/// circuit breaker. Owned by exactly one cache entry.
pub struct ConnectedSession {
    identity: String,
    endpoint_name: Option<String>,
    device_id: String,
    transport: Arc<dyn TransportSession>,
    breaker: CircuitBreaker,
}

impl ConnectedSession {
    pub(crate) fn new(
        identity: String,
        endpoint_name: Option<String>,
        device_id: String,
        transport: Arc<dyn TransportSession>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            identity,
            endpoint_name,
            device_id,
            transport,
            breaker,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn endpoint_name(&self) -> Option<&str> {
        self.endpoint_name.as_deref()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Forward one device-to-cloud payload. Failures surface to the caller
    /// without retrying; the session stays cached so a later send can.
    pub async fn send(&self, payload: Bytes) -> GatewayResult<()> {
        let message = CloudMessage {
            body: payload,
            content_type: MESSAGE_CONTENT_TYPE.to_owned(),
            content_encoding: MESSAGE_CONTENT_ENCODING.to_owned(),
        };
        self.transport
            .send(message)
            .await
            .map_err(|err| GatewayError::DeliveryFailure {
                identity: self.identity.clone(),
                reason: err.to_string(),
            })
    }

    /// Attempt one bounded-wait receive and forward the result through
    /// `handler`, guarded by the breaker.
    ///
    /// On handler success the item is acknowledged; on handler failure it is
    /// rejected so the backend may redeliver it. An open breaker skips the
    /// transport entirely.
    pub async fn poll_and_forward(
        &self,
        wait: Duration,
        handler: &CloudMessageHandler,
    ) -> GatewayResult<PollOutcome> {
        if !self.breaker.allows_call() {
            return Ok(PollOutcome::Skipped);
        }
        match self.receive_and_forward(wait, handler).await {
            Ok(outcome) => {
                self.breaker.record_success();
                Ok(outcome)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }

    async fn receive_and_forward(
        &self,
        wait: Duration,
        handler: &CloudMessageHandler,
    ) -> GatewayResult<PollOutcome> {
        let received = self.transport.receive(wait).await.map_err(|err| {
            GatewayError::ReceiveFailure {
                identity: self.identity.clone(),
                reason: err.to_string(),
            }
        })?;
        let Some(message) = received else {
            return Ok(PollOutcome::Empty);
        };

        let endpoint = self.endpoint_name.as_deref().unwrap_or("");
        match (handler.as_ref())(endpoint, &self.device_id, message.clone()).await {
            Ok(()) => {
                self.transport.ack(&message).await.map_err(|err| {
                    GatewayError::ReceiveFailure {
                        identity: self.identity.clone(),
                        reason: err.to_string(),
                    }
                })?;
                debug!(
                    identity = %self.identity,
                    message_id = %message.id,
                    "inbound message delivered"
                );
                Ok(PollOutcome::Delivered)
            }
            Err(callback_err) => {
                if let Err(reject_err) = self.transport.reject(&message).await {
                    warn!(
                        identity = %self.identity,
                        error = %reject_err,
                        "failed to reject message after callback failure"
                    );
                }
                Err(GatewayError::ForwardingFailure {
                    identity: self.identity.clone(),
                    reason: callback_err.to_string(),
                })
            }
        }
    }

    pub(crate) async fn close_transport(&self) -> GatewayResult<()> {
        self.transport
            .close()
            .await
            .map_err(|err| GatewayError::ConnectionFailure {
                identity: self.identity.clone(),
                reason: err.to_string(),
            })
    }
}
