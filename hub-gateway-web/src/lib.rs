//! HTTP surface of the gateway: a single send endpoint that authenticates
//! each request and hands the payload to the connection core.

mod api;
mod state;

pub use api::configure_routes;
pub use state::AppState;
