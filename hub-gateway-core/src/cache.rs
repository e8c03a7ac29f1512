use crate::{CircuitBreaker, ConnectedSession, DeviceRegistry};
use backoff::backoff::Backoff;
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use hub_gateway_error::{GatewayError, GatewayResult};
use hub_gateway_models::SettingsInner;
use hub_gateway_sdk::{
    build_exponential_backoff, DeviceCredentials, MethodHandler, PoolingOptions, RetryPolicy,
    TransportConnector, TransportSession,
};
use moka::future::Cache;
use moka::notification::{ListenerFuture, RemovalCause};
use moka::Expiry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, info, warn};

/// Tunables for the connection cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub pooling: PoolingOptions,
    /// Session lifetime when creation params fix no expiration.
    pub default_session_lifetime: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown: Duration,
    /// Retry policy for direct method handler registration.
    pub registration_retry: RetryPolicy,
}

impl CacheConfig {
    pub fn from_settings(settings: &SettingsInner) -> Self {
        Self {
            pooling: PoolingOptions {
                max_pool_size: settings.hub.max_pool_size,
                operation_timeout: StdDuration::from_millis(settings.hub.operation_timeout_ms),
            },
            default_session_lifetime: Duration::minutes(
                settings.hub.default_session_minutes as i64,
            ),
            breaker_failure_threshold: settings.cloud_messages.breaker_failure_threshold,
            breaker_cooldown: Duration::seconds(
                settings.cloud_messages.breaker_cooldown_secs as i64,
            ),
            registration_retry: Self::registration_retry_default(),
        }
    }

    /// Up to five tries with waits of 2, 4, 8, and 16 seconds, matching the
    /// backend guidance for method subscription.
    pub fn registration_retry_default() -> RetryPolicy {
        RetryPolicy {
            max_attempts: Some(5),
            initial_interval_ms: 2_000,
            max_interval_ms: 16_000,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_elapsed_time_ms: None,
        }
    }
}

/// Inputs for creating one cache entry.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Backend endpoint name; `None` when the credentials carry the endpoint.
    pub endpoint_name: Option<String>,
    pub device_id: String,
    pub credentials: DeviceCredentials,
    /// Absolute entry deadline; the configured default lifetime when `None`.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
struct CacheItem {
    session: Arc<ConnectedSession>,
    ttl: StdDuration,
    serial: u64,
}

/// Expiration is absolute: fixed at creation, untouched by reads.
struct SessionExpiry;

impl Expiry<String, CacheItem> for SessionExpiry {
    fn expire_after_create(
        &self,
        _identity: &String,
        item: &CacheItem,
        _created_at: Instant,
    ) -> Option<StdDuration> {
        Some(item.ttl)
    }

    fn expire_after_update(
        &self,
        _identity: &String,
        item: &CacheItem,
        _updated_at: Instant,
        _remaining: Option<StdDuration>,
    ) -> Option<StdDuration> {
        Some(item.ttl)
    }
}

/// The multiplexer core: live per-device sessions keyed by device identity.
///
/// Creation is single-flight per identity and failures are never cached.
/// Every successful creation registers the identity in the [`DeviceRegistry`];
/// every eviction, whether by deadline or explicit invalidation, unregisters
/// it and closes the underlying transport.
pub struct DeviceConnectionCache {
    entries: Cache<String, CacheItem>,
    registry: DeviceRegistry,
    connector: Arc<dyn TransportConnector>,
    config: CacheConfig,
    method_handler: Option<MethodHandler>,
    next_serial: AtomicU64,
}

impl DeviceConnectionCache {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        registry: DeviceRegistry,
        config: CacheConfig,
        method_handler: Option<MethodHandler>,
    ) -> Self {
        let eviction_registry = registry.clone();
        let entries = Cache::builder()
            .expire_after(SessionExpiry)
            .async_eviction_listener(
                move |identity: Arc<String>, item: CacheItem, cause: RemovalCause| -> ListenerFuture {
                    let registry = eviction_registry.clone();
                    async move {
                        registry.remove(identity.as_str(), item.serial);
                        debug!(identity = %identity, ?cause, "session evicted");
                        if let Err(err) = item.session.close_transport().await {
                            warn!(
                                identity = %identity,
                                error = %err,
                                "failed to close evicted session"
                            );
                        }
                    }
                    .boxed()
                },
            )
            .build();
        Self {
            entries,
            registry,
            connector,
            config,
            method_handler,
            next_serial: AtomicU64::new(0),
        }
    }

    /// Get-or-create the session for `identity`.
    ///
    /// Concurrent resolves racing on the same identity share exactly one
    /// creation: every caller gets the same session or the same failure. A
    /// failed creation leaves no entry behind, so the next resolve retries
    /// from scratch.
    pub async fn resolve(
        &self,
        identity: &str,
        params: SessionParams,
    ) -> GatewayResult<Arc<ConnectedSession>> {
        let item = self
            .entries
            .try_get_with(identity.to_owned(), self.create_entry(identity, params))
            .await
            .map_err(|err: Arc<GatewayError>| err.as_ref().clone())?;
        Ok(item.session)
    }

    /// Lookup without creating. Expired entries are absent.
    pub async fn get(&self, identity: &str) -> Option<Arc<ConnectedSession>> {
        self.entries.get(identity).await.map(|item| item.session)
    }

    /// Drop one entry; the eviction listener unregisters and closes it.
    pub async fn invalidate(&self, identity: &str) {
        self.entries.invalidate(identity).await;
    }

    /// Drop every entry and wait for the eviction work to finish.
    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Flush pending expiration and eviction work.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    async fn create_entry(
        &self,
        identity: &str,
        params: SessionParams,
    ) -> GatewayResult<CacheItem> {
        let SessionParams {
            endpoint_name,
            device_id,
            credentials,
            expires_at,
        } = params;

        let expires_at =
            expires_at.unwrap_or_else(|| Utc::now() + self.config.default_session_lifetime);
        let remaining = expires_at - Utc::now();
        if remaining <= Duration::zero() {
            return Err(GatewayError::ValidationFailure(
                "token already expired".to_owned(),
            ));
        }
        let ttl = remaining.to_std().map_err(|err| {
            GatewayError::ValidationFailure(format!("invalid session lifetime: {err}"))
        })?;

        let endpoint = endpoint_name.as_deref().unwrap_or("");
        info!(identity = %identity, endpoint = %endpoint, "opening device session");
        let transport = self
            .connector
            .open(endpoint, &device_id, credentials, self.config.pooling)
            .await
            .map_err(|err| GatewayError::ConnectionFailure {
                identity: identity.to_owned(),
                reason: err.to_string(),
            })?;

        if let Some(handler) = &self.method_handler {
            if let Err(err) = self
                .register_method_handler(identity, transport.as_ref(), handler.clone())
                .await
            {
                if let Err(close_err) = transport.close().await {
                    warn!(
                        identity = %identity,
                        error = %close_err,
                        "failed to close session after registration failure"
                    );
                }
                return Err(err);
            }
        }

        let breaker = CircuitBreaker::new(
            self.config.breaker_failure_threshold,
            self.config.breaker_cooldown,
        );
        let session = Arc::new(ConnectedSession::new(
            identity.to_owned(),
            endpoint_name,
            device_id,
            transport,
            breaker,
        ));
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        self.registry.add(identity, serial);
        debug!(identity = %identity, expires_at = %expires_at, "session cached");
        Ok(CacheItem {
            session,
            ttl,
            serial,
        })
    }

    async fn register_method_handler(
        &self,
        identity: &str,
        transport: &dyn TransportSession,
        handler: MethodHandler,
    ) -> GatewayResult<()> {
        let policy = &self.config.registration_retry;
        let mut backoff = build_exponential_backoff(policy);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match transport.register_method_handler(handler.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            let out_of_attempts = policy.max_attempts.map_or(false, |max| attempt >= max);
            let delay = if out_of_attempts {
                None
            } else {
                backoff.next_backoff()
            };
            match delay {
                Some(delay) => {
                    warn!(
                        identity = %identity,
                        attempt,
                        error = %err,
                        "method handler registration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(GatewayError::ConnectionFailure {
                        identity: identity.to_owned(),
                        reason: format!("method handler registration failed: {err}"),
                    });
                }
            }
        }
    }
}
