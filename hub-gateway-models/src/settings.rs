//! Typed runtime settings layered from an optional file and the environment.

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use config::{Config, Environment, File};
use serde::Deserialize;

use hub_gateway_error::{GatewayError, GatewayResult};

use crate::constants::{DEFAULT_CONFIG_FILE_NAME, ENV_PREFIX, ENV_SEPARATOR};

/// Cheaply cloneable handle to the loaded configuration.
#[derive(Debug, Clone)]
pub struct Settings(Arc<SettingsInner>);

impl Settings {
    /// Loads settings from `config_file` (the default file when `None`), then
    /// applies environment overrides such as `HUBGW_WEB__PORT=9090`.
    ///
    /// The default file may be absent; an explicitly named file may not.
    pub fn new(config_file: Option<&Path>) -> GatewayResult<Self> {
        let mut builder = Config::builder();
        builder = match config_file {
            Some(path) => builder.add_source(File::from(path.to_path_buf())),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE_NAME).required(false)),
        };
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()
            .map_err(|e| GatewayError::ConfigurationFailure(e.to_string()))?;
        let inner: SettingsInner = config
            .try_deserialize()
            .map_err(|e| GatewayError::ConfigurationFailure(e.to_string()))?;
        Ok(Self(Arc::new(inner)))
    }
}

impl Deref for Settings {
    type Target = SettingsInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<SettingsInner> for Settings {
    fn from(inner: SettingsInner) -> Self {
        Self(Arc::new(inner))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsInner {
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub cloud_messages: CloudMessageSettings,
    #[serde(default)]
    pub direct_methods: DirectMethodSettings,
    #[serde(default)]
    pub web: WebSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// Backend endpoint, credential policy, and session-lifetime options.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    /// Backend host, e.g. `myhub.azure-devices.net`. May stay empty when
    /// sessions are only opened from caller-supplied connection strings.
    #[serde(default = "HubSettings::host_name_default")]
    pub host_name: String,
    #[serde(default = "HubSettings::access_policy_name_default")]
    pub access_policy_name: String,
    #[serde(default = "HubSettings::access_policy_key_default")]
    pub access_policy_key: String,
    /// Lets requests without credentials fall back to the access policy.
    #[serde(default = "HubSettings::shared_access_enabled_default")]
    pub shared_access_enabled: bool,
    /// Lets requests supply a full device connection string.
    #[serde(default = "HubSettings::connection_string_enabled_default")]
    pub connection_string_enabled: bool,
    /// Upper bound on transport connections multiplexed per endpoint.
    #[serde(default = "HubSettings::max_pool_size_default")]
    pub max_pool_size: u16,
    #[serde(default = "HubSettings::operation_timeout_ms_default")]
    pub operation_timeout_ms: u64,
    /// Lifetime of a cached session when the request fixes no expiration.
    #[serde(default = "HubSettings::default_session_minutes_default")]
    pub default_session_minutes: u64,
}

impl HubSettings {
    fn host_name_default() -> String {
        String::new()
    }

    fn access_policy_name_default() -> String {
        String::new()
    }

    fn access_policy_key_default() -> String {
        String::new()
    }

    fn shared_access_enabled_default() -> bool {
        false
    }

    fn connection_string_enabled_default() -> bool {
        false
    }

    fn max_pool_size_default() -> u16 {
        u16::MAX
    }

    fn operation_timeout_ms_default() -> u64 {
        10_000
    }

    fn default_session_minutes_default() -> u64 {
        60
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            host_name: Self::host_name_default(),
            access_policy_name: Self::access_policy_name_default(),
            access_policy_key: Self::access_policy_key_default(),
            shared_access_enabled: Self::shared_access_enabled_default(),
            connection_string_enabled: Self::connection_string_enabled_default(),
            max_pool_size: Self::max_pool_size_default(),
            operation_timeout_ms: Self::operation_timeout_ms_default(),
            default_session_minutes: Self::default_session_minutes_default(),
        }
    }
}

/// Inbound cloud-to-device polling options.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudMessageSettings {
    #[serde(default = "CloudMessageSettings::enabled_default")]
    pub enabled: bool,
    /// Sessions polled concurrently within one pass.
    #[serde(default = "CloudMessageSettings::parallelism_default")]
    pub parallelism: usize,
    /// Per-device receive wait; sub-second so passes stay cheap.
    #[serde(default = "CloudMessageSettings::receive_wait_ms_default")]
    pub receive_wait_ms: u64,
    /// Delay between passes over a non-empty registry.
    #[serde(default = "CloudMessageSettings::pass_delay_ms_default")]
    pub pass_delay_ms: u64,
    /// Delay after a pass over an empty registry.
    #[serde(default = "CloudMessageSettings::idle_delay_ms_default")]
    pub idle_delay_ms: u64,
    /// Consecutive failures that trip a session's breaker.
    #[serde(default = "CloudMessageSettings::breaker_failure_threshold_default")]
    pub breaker_failure_threshold: u32,
    /// How long a tripped breaker skips the session.
    #[serde(default = "CloudMessageSettings::breaker_cooldown_secs_default")]
    pub breaker_cooldown_secs: u64,
}

impl CloudMessageSettings {
    fn enabled_default() -> bool {
        false
    }

    fn parallelism_default() -> usize {
        10
    }

    fn receive_wait_ms_default() -> u64 {
        1
    }

    fn pass_delay_ms_default() -> u64 {
        0
    }

    fn idle_delay_ms_default() -> u64 {
        100
    }

    fn breaker_failure_threshold_default() -> u32 {
        1
    }

    fn breaker_cooldown_secs_default() -> u64 {
        60
    }
}

impl Default for CloudMessageSettings {
    fn default() -> Self {
        Self {
            enabled: Self::enabled_default(),
            parallelism: Self::parallelism_default(),
            receive_wait_ms: Self::receive_wait_ms_default(),
            pass_delay_ms: Self::pass_delay_ms_default(),
            idle_delay_ms: Self::idle_delay_ms_default(),
            breaker_failure_threshold: Self::breaker_failure_threshold_default(),
            breaker_cooldown_secs: Self::breaker_cooldown_secs_default(),
        }
    }
}

/// Direct method routing options.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectMethodSettings {
    #[serde(default = "DirectMethodSettings::enabled_default")]
    pub enabled: bool,
}

impl DirectMethodSettings {
    fn enabled_default() -> bool {
        false
    }
}

impl Default for DirectMethodSettings {
    fn default() -> Self {
        Self {
            enabled: Self::enabled_default(),
        }
    }
}

/// HTTP server options.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSettings {
    #[serde(default = "WebSettings::host_default")]
    pub host: String,
    #[serde(default = "WebSettings::port_default")]
    pub port: u16,
    /// Worker threads; the runtime default when unset.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl WebSettings {
    fn host_default() -> String {
        "0.0.0.0".to_string()
    }

    fn port_default() -> u16 {
        8080
    }
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: Self::host_default(),
            port: Self::port_default(),
            workers: None,
        }
    }
}

/// Logging options.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default = "LogSettings::level_default")]
    pub level: String,
    #[serde(default = "LogSettings::dir_default")]
    pub dir: String,
    #[serde(default = "LogSettings::file_prefix_default")]
    pub file_prefix: String,
}

impl LogSettings {
    fn level_default() -> String {
        "info".to_string()
    }

    fn dir_default() -> String {
        "logs".to_string()
    }

    fn file_prefix_default() -> String {
        "hub-gateway".to_string()
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Self::level_default(),
            dir: Self::dir_default(),
            file_prefix: Self::file_prefix_default(),
        }
    }
}
