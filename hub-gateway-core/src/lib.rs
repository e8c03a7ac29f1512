//! Device-connection multiplexer.
//!
//! The core of the gateway: a [`DeviceConnectionCache`] of live per-device
//! transport sessions with absolute expiration and single-flight creation, a
//! [`DeviceRegistry`] mirroring which identities are cached, and a
//! [`CloudMessagePoller`] that continuously drains inbound messages for every
//! registered device under bounded parallelism with per-device circuit
//! breaking. [`HubGateway`] ties the pieces together behind the
//! [`GatewayService`] send operations.

pub mod breaker;
pub mod cache;
pub mod gateway;
pub mod poller;
pub mod registry;
pub mod session;

pub use breaker::CircuitBreaker;
pub use cache::{CacheConfig, DeviceConnectionCache, SessionParams};
pub use gateway::{GatewayCallbacks, GatewayService, HubGateway};
pub use poller::{CloudMessagePoller, PollerConfig};
pub use registry::DeviceRegistry;
pub use session::{ConnectedSession, PollOutcome};
