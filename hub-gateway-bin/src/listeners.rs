use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hub_gateway_core::GatewayCallbacks;
use hub_gateway_models::Settings;
use hub_gateway_sdk::{
    CloudMessageHandler, HandlerResult, InboundMessage, MethodHandler, MethodRequest,
    MethodResponse, MethodResult,
};
use tracing::info;

/// Debug callbacks, wired for each feature that is enabled. They stand in
/// for an application integration: cloud messages are logged, direct methods
/// are logged and answered by echoing the request payload.
pub fn debug_callbacks(settings: &Settings) -> GatewayCallbacks {
    GatewayCallbacks {
        cloud_message: settings.cloud_messages.enabled.then(cloud_message_logger),
        direct_method: settings.direct_methods.enabled.then(direct_method_echo),
    }
}

fn cloud_message_logger() -> CloudMessageHandler {
    Arc::new(
        |endpoint_name: &str, device_id: &str, message: InboundMessage| {
            let endpoint_name = endpoint_name.to_owned();
            let device_id = device_id.to_owned();
            let fut: Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>> =
                Box::pin(async move {
                    info!(
                        endpoint_name = %endpoint_name,
                        device_id = %device_id,
                        message_id = %message.id,
                        bytes = message.body.len(),
                        "cloud message received"
                    );
                    Ok(())
                });
            fut
        },
    )
}

fn direct_method_echo() -> MethodHandler {
    Arc::new(
        |endpoint_name: &str, device_id: &str, request: MethodRequest| {
            let endpoint_name = endpoint_name.to_owned();
            let device_id = device_id.to_owned();
            let fut: Pin<Box<dyn Future<Output = MethodResult> + Send + 'static>> =
                Box::pin(async move {
                    info!(
                        endpoint_name = %endpoint_name,
                        device_id = %device_id,
                        method = %request.method_name,
                        bytes = request.payload.len(),
                        "direct method invoked"
                    );
                    Ok(MethodResponse {
                        status: 200,
                        payload: request.payload,
                    })
                });
            fut
        },
    )
}
