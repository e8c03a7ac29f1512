//! Error taxonomy shared across the gateway crates.

mod web;

pub use web::WebError;

use thiserror::Error;

/// Result alias used throughout the gateway.
pub type GatewayResult<T, E = GatewayError> = Result<T, E>;

/// Failures raised by the device-connection core.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Malformed or missing request material. Never retried.
    #[error("{0}")]
    ValidationFailure(String),

    /// Opening a transport session failed; no cache entry is left behind.
    #[error("failed to connect device {identity}: {reason}")]
    ConnectionFailure { identity: String, reason: String },

    /// A send over an established session failed; the session stays cached.
    #[error("failed to deliver message for {identity}: {reason}")]
    DeliveryFailure { identity: String, reason: String },

    /// The inbound-message callback rejected a polled item.
    #[error("cloud message callback failed for {identity}: {reason}")]
    ForwardingFailure { identity: String, reason: String },

    /// Receiving or settling an inbound item failed. Logged by the poller,
    /// never surfaced to request callers.
    #[error("failed to receive for {identity}: {reason}")]
    ReceiveFailure { identity: String, reason: String },

    /// Settings could not be loaded or parsed.
    #[error("configuration failure: {0}")]
    ConfigurationFailure(String),
}

impl GatewayError {
    /// Stable machine-readable tag for logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationFailure(_) => "validation_failure",
            Self::ConnectionFailure { .. } => "connection_failure",
            Self::DeliveryFailure { .. } => "delivery_failure",
            Self::ForwardingFailure { .. } => "forwarding_failure",
            Self::ReceiveFailure { .. } => "receive_failure",
            Self::ConfigurationFailure(_) => "configuration_failure",
        }
    }
}
