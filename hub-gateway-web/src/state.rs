use std::sync::Arc;

use hub_gateway_core::GatewayService;
use hub_gateway_models::Settings;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn GatewayService>,
    pub settings: Settings,
}
