//! Transport abstraction consumed by the connection multiplexer.
//!
//! A [`TransportConnector`] opens one authenticated [`TransportSession`] per
//! device; the sessions are cached and polled by `hub-gateway-core`. The
//! in-memory [`LoopbackConnector`] backs tests and local runs without a
//! reachable backend.

mod credentials;
mod error;
mod loopback;
mod message;
mod retry;
mod transport;

pub type TransportResult<T> = Result<T, TransportError>;

pub use credentials::{DeviceCredentials, PoolingOptions};
pub use error::TransportError;
pub use loopback::LoopbackConnector;
pub use message::{
    CloudMessage, CloudMessageHandler, HandlerResult, InboundMessage, MethodHandler, MethodRequest,
    MethodResponse, MethodResult,
};
pub use retry::{build_exponential_backoff, RetryPolicy};
pub use transport::{TransportConnector, TransportSession};
