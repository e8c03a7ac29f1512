#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use hub_gateway_core::{CacheConfig, PollerConfig, SessionParams};
use hub_gateway_sdk::{
    CloudMessage, CloudMessageHandler, DeviceCredentials, HandlerResult, InboundMessage,
    LoopbackConnector, MethodHandler, MethodRequest, MethodResponse, MethodResult, PoolingOptions,
    RetryPolicy, TransportConnector, TransportError, TransportResult, TransportSession,
};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::time::sleep;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .compact()
            .try_init();
    });
}

/// Loopback-backed connector with a scriptable open path: counts attempts,
/// injects delays, and fails a chosen number of opens.
pub struct TestConnector {
    pub loopback: Arc<LoopbackConnector>,
    open_delay: Mutex<Duration>,
    fail_opens: AtomicUsize,
    attempts: AtomicUsize,
}

impl TestConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            loopback: Arc::new(LoopbackConnector::new()),
            open_delay: Mutex::new(Duration::ZERO),
            fail_opens: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.fail_opens.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for TestConnector {
    async fn open(
        &self,
        endpoint: &str,
        device_id: &str,
        credentials: DeviceCredentials,
        pooling: PoolingOptions,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.open_delay.lock().unwrap();
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let scripted_failure = self
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(TransportError::OpenFailed {
                identity: device_id.to_owned(),
                reason: "scripted open failure".into(),
            });
        }
        self.loopback
            .open(endpoint, device_id, credentials, pooling)
            .await
    }
}

/// Session whose receives fail a scripted number of times (`usize::MAX`
/// means forever) and whose sends can be made to fail outright. Everything
/// else succeeds and receives nothing.
pub struct FlakySession {
    identity: String,
    fail_sends: bool,
    receive_failures: Arc<AtomicUsize>,
    receive_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TransportSession for FlakySession {
    async fn send(&self, _message: CloudMessage) -> TransportResult<()> {
        if self.fail_sends {
            return Err(TransportError::SendFailed {
                identity: self.identity.clone(),
                reason: "scripted send failure".into(),
            });
        }
        Ok(())
    }

    async fn receive(&self, _wait: Duration) -> TransportResult<Option<InboundMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .receive_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(TransportError::ReceiveFailed {
                identity: self.identity.clone(),
                reason: "scripted receive failure".into(),
            });
        }
        Ok(None)
    }

    async fn ack(&self, _message: &InboundMessage) -> TransportResult<()> {
        Ok(())
    }

    async fn reject(&self, _message: &InboundMessage) -> TransportResult<()> {
        Ok(())
    }

    async fn register_method_handler(&self, _handler: MethodHandler) -> TransportResult<()> {
        Ok(())
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

/// Connector producing uniformly misbehaving sessions.
pub struct FlakyConnector {
    fail_sends: bool,
    receive_failures: usize,
    receive_calls: Arc<AtomicUsize>,
}

impl FlakyConnector {
    /// Sessions whose receives always fail.
    pub fn always_failing() -> Arc<Self> {
        Arc::new(Self {
            fail_sends: false,
            receive_failures: usize::MAX,
            receive_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Sessions whose sends always fail; receives find nothing.
    pub fn failing_sends() -> Arc<Self> {
        Arc::new(Self {
            fail_sends: true,
            receive_failures: 0,
            receive_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for FlakyConnector {
    async fn open(
        &self,
        _endpoint: &str,
        device_id: &str,
        _credentials: DeviceCredentials,
        _pooling: PoolingOptions,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        Ok(Arc::new(FlakySession {
            identity: device_id.to_owned(),
            fail_sends: self.fail_sends,
            receive_failures: Arc::new(AtomicUsize::new(self.receive_failures)),
            receive_calls: self.receive_calls.clone(),
        }))
    }
}

/// Routes chosen device ids to always-failing sessions and everything else
/// to the loopback, so one bad device can sit next to healthy ones.
pub struct RoutingConnector {
    pub loopback: Arc<LoopbackConnector>,
    failing_devices: HashSet<String>,
    failing_receive_calls: Arc<AtomicUsize>,
}

impl RoutingConnector {
    pub fn new(failing_devices: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            loopback: Arc::new(LoopbackConnector::new()),
            failing_devices: failing_devices.iter().map(|d| d.to_string()).collect(),
            failing_receive_calls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing_receive_calls(&self) -> usize {
        self.failing_receive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for RoutingConnector {
    async fn open(
        &self,
        endpoint: &str,
        device_id: &str,
        credentials: DeviceCredentials,
        pooling: PoolingOptions,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        if self.failing_devices.contains(device_id) {
            return Ok(Arc::new(FlakySession {
                identity: device_id.to_owned(),
                fail_sends: false,
                receive_failures: Arc::new(AtomicUsize::new(usize::MAX)),
                receive_calls: self.failing_receive_calls.clone(),
            }));
        }
        self.loopback
            .open(endpoint, device_id, credentials, pooling)
            .await
    }
}

/// Connector whose sessions fail method handler registration a scripted
/// number of times (`usize::MAX` means forever).
pub struct FlakyRegistrationConnector {
    loopback: Arc<LoopbackConnector>,
    registration_failures: Arc<AtomicUsize>,
    registration_attempts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FlakyRegistrationConnector {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            loopback: Arc::new(LoopbackConnector::new()),
            registration_failures: Arc::new(AtomicUsize::new(failures)),
            registration_attempts: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn registration_attempts(&self) -> usize {
        self.registration_attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for FlakyRegistrationConnector {
    async fn open(
        &self,
        endpoint: &str,
        device_id: &str,
        credentials: DeviceCredentials,
        pooling: PoolingOptions,
    ) -> TransportResult<Arc<dyn TransportSession>> {
        let inner = self
            .loopback
            .open(endpoint, device_id, credentials, pooling)
            .await?;
        Ok(Arc::new(FlakyRegistrationSession {
            identity: device_id.to_owned(),
            inner,
            failures: self.registration_failures.clone(),
            attempts: self.registration_attempts.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct FlakyRegistrationSession {
    identity: String,
    inner: Arc<dyn TransportSession>,
    failures: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl TransportSession for FlakyRegistrationSession {
    async fn send(&self, message: CloudMessage) -> TransportResult<()> {
        self.inner.send(message).await
    }

    async fn receive(&self, wait: Duration) -> TransportResult<Option<InboundMessage>> {
        self.inner.receive(wait).await
    }

    async fn ack(&self, message: &InboundMessage) -> TransportResult<()> {
        self.inner.ack(message).await
    }

    async fn reject(&self, message: &InboundMessage) -> TransportResult<()> {
        self.inner.reject(message).await
    }

    async fn register_method_handler(&self, handler: MethodHandler) -> TransportResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(TransportError::RegistrationFailed {
                identity: self.identity.clone(),
                reason: "scripted registration failure".into(),
            });
        }
        self.inner.register_method_handler(handler).await
    }

    async fn close(&self) -> TransportResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

pub type SeenMessages = Arc<Mutex<Vec<(String, String, Bytes)>>>;

/// Handler recording `(endpoint, device_id, body)` for every message.
pub fn recording_handler() -> (CloudMessageHandler, SeenMessages) {
    let seen: SeenMessages = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler: CloudMessageHandler =
        Arc::new(move |endpoint: &str, device_id: &str, message: InboundMessage| {
            let sink = sink.clone();
            let endpoint = endpoint.to_owned();
            let device_id = device_id.to_owned();
            let fut: Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>> =
                Box::pin(async move {
                    sink.lock()
                        .unwrap()
                        .push((endpoint, device_id, message.body));
                    Ok(())
                });
            fut
        });
    (handler, seen)
}

/// Handler that always fails, driving the reject path.
pub fn failing_handler() -> CloudMessageHandler {
    Arc::new(|_: &str, _: &str, _: InboundMessage| {
        let fut: Pin<Box<dyn Future<Output = HandlerResult> + Send + 'static>> =
            Box::pin(async { Err(anyhow!("handler exploded")) });
        fut
    })
}

pub fn noop_method_handler() -> MethodHandler {
    Arc::new(|_: &str, _: &str, _: MethodRequest| {
        let fut: Pin<Box<dyn Future<Output = MethodResult> + Send + 'static>> =
            Box::pin(async { Ok(MethodResponse::ok()) });
        fut
    })
}

/// Cache config with timings short enough for tests.
pub fn fast_cache_config() -> CacheConfig {
    CacheConfig {
        pooling: PoolingOptions {
            max_pool_size: 16,
            operation_timeout: Duration::from_millis(500),
        },
        default_session_lifetime: chrono::Duration::minutes(10),
        breaker_failure_threshold: 1,
        breaker_cooldown: chrono::Duration::milliseconds(200),
        registration_retry: RetryPolicy {
            max_attempts: Some(3),
            initial_interval_ms: 1,
            max_interval_ms: 4,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_elapsed_time_ms: None,
        },
    }
}

pub fn fast_poller_config() -> PollerConfig {
    PollerConfig {
        parallelism: 4,
        receive_wait: Duration::from_millis(5),
        pass_delay: Duration::ZERO,
        idle_delay: Duration::from_millis(10),
    }
}

pub fn shared_access_params(device_id: &str) -> SessionParams {
    SessionParams {
        endpoint_name: Some("testhub".to_owned()),
        device_id: device_id.to_owned(),
        credentials: DeviceCredentials::SharedAccessKey {
            policy_name: "service".to_owned(),
            policy_key: "key".to_owned(),
        },
        expires_at: None,
    }
}

pub fn identity_of(device_id: &str) -> String {
    format!("testhub_{device_id}")
}

/// Poll `condition` until it holds or `timeout` elapses; panics on timeout.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        sleep(Duration::from_millis(5)).await;
    }
}
