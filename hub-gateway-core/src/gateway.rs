use crate::{
    CacheConfig, CloudMessagePoller, DeviceConnectionCache, DeviceRegistry, PollerConfig,
    SessionParams,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hub_gateway_error::GatewayResult;
use hub_gateway_models::{device_identity, endpoint_name_from_host, resolve_endpoint_name, Settings};
use hub_gateway_sdk::{CloudMessageHandler, DeviceCredentials, MethodHandler, TransportConnector};
use std::sync::Arc;
use tracing::{info, warn};

/// Caller-supplied callbacks wired in at startup.
#[derive(Clone, Default)]
pub struct GatewayCallbacks {
    /// Invoked for every inbound cloud-to-device message. Absence disables
    /// the poller.
    pub cloud_message: Option<CloudMessageHandler>,
    /// Invoked for direct method calls; registered on every new session when
    /// direct methods are enabled.
    pub direct_method: Option<MethodHandler>,
}

/// Send operations exposed to the request layer.
#[async_trait]
pub trait GatewayService: Send + Sync {
    /// Send authenticating with a caller-supplied time-boxed token. The
    /// session is cached until the token expires.
    async fn send_by_token(
        &self,
        device_id: &str,
        payload: Bytes,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> GatewayResult<()>;

    /// Send authenticating with the configured shared access policy.
    async fn send_by_shared_access(&self, device_id: &str, payload: Bytes) -> GatewayResult<()>;

    /// Send authenticating with a caller-supplied connection string.
    async fn send_by_connection_string(
        &self,
        connection_string: &str,
        device_id: &str,
        payload: Bytes,
    ) -> GatewayResult<()>;
}

/// Orchestrates sends through the connection cache and owns the poller.
pub struct HubGateway {
    settings: Settings,
    cache: Arc<DeviceConnectionCache>,
    registry: DeviceRegistry,
    poller: Option<CloudMessagePoller>,
}

impl HubGateway {
    pub fn new(
        settings: Settings,
        connector: Arc<dyn TransportConnector>,
        callbacks: GatewayCallbacks,
    ) -> Arc<Self> {
        let registry = DeviceRegistry::new();

        let method_handler = if settings.direct_methods.enabled {
            if callbacks.direct_method.is_none() {
                warn!("direct methods enabled but no callback configured");
            }
            callbacks.direct_method
        } else {
            None
        };

        let cache = Arc::new(DeviceConnectionCache::new(
            connector,
            registry.clone(),
            CacheConfig::from_settings(&settings),
            method_handler,
        ));

        let poller = if settings.cloud_messages.enabled {
            match callbacks.cloud_message {
                Some(handler) => Some(CloudMessagePoller::new(
                    cache.clone(),
                    registry.clone(),
                    handler,
                    PollerConfig::from_settings(&settings),
                )),
                None => {
                    warn!("cloud messages enabled but no callback configured, poller will not run");
                    None
                }
            }
        } else {
            None
        };

        Arc::new(Self {
            settings,
            cache,
            registry,
            poller,
        })
    }

    /// Start background work. Call once after construction.
    pub async fn init(&self) {
        if let Some(poller) = &self.poller {
            poller.start().await;
        }
        info!("hub gateway initialized");
    }

    /// Stop the poller and drop every cached session.
    pub async fn stop(&self) {
        if let Some(poller) = &self.poller {
            poller.stop().await;
        }
        self.cache.clear().await;
        info!("hub gateway stopped");
    }

    pub fn cache(&self) -> &Arc<DeviceConnectionCache> {
        &self.cache
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn configured_endpoint(&self) -> Option<String> {
        let name = endpoint_name_from_host(&self.settings.hub.host_name);
        (!name.is_empty()).then_some(name)
    }

    async fn resolve_and_send(
        &self,
        endpoint_name: Option<String>,
        device_id: &str,
        credentials: DeviceCredentials,
        expires_at: Option<DateTime<Utc>>,
        payload: Bytes,
    ) -> GatewayResult<()> {
        let identity = device_identity(endpoint_name.as_deref(), device_id);
        let params = SessionParams {
            endpoint_name,
            device_id: device_id.to_owned(),
            credentials,
            expires_at,
        };
        let session = self.cache.resolve(&identity, params).await?;
        session.send(payload).await
    }
}

#[async_trait]
impl GatewayService for HubGateway {
    async fn send_by_token(
        &self,
        device_id: &str,
        payload: Bytes,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        let credentials = DeviceCredentials::Token {
            token: token.to_owned(),
            expires_at,
        };
        self.resolve_and_send(
            self.configured_endpoint(),
            device_id,
            credentials,
            Some(expires_at),
            payload,
        )
        .await
    }

    async fn send_by_shared_access(&self, device_id: &str, payload: Bytes) -> GatewayResult<()> {
        let credentials = DeviceCredentials::SharedAccessKey {
            policy_name: self.settings.hub.access_policy_name.clone(),
            policy_key: self.settings.hub.access_policy_key.clone(),
        };
        self.resolve_and_send(self.configured_endpoint(), device_id, credentials, None, payload)
            .await
    }

    async fn send_by_connection_string(
        &self,
        connection_string: &str,
        device_id: &str,
        payload: Bytes,
    ) -> GatewayResult<()> {
        let endpoint = resolve_endpoint_name(connection_string);
        let endpoint_name = (!endpoint.is_empty()).then_some(endpoint);
        let credentials = DeviceCredentials::ConnectionString {
            value: connection_string.to_owned(),
        };
        self.resolve_and_send(endpoint_name, device_id, credentials, None, payload)
            .await
    }
}
