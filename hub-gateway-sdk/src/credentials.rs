use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Authentication material for one device session.
///
/// Exactly one variant applies per session; the caller picks it when the
/// session is created and it is never renewed in place. A token-authenticated
/// session is expected to be evicted at the token's expiration.
#[derive(Clone)]
pub enum DeviceCredentials {
    /// Hub-level shared access policy applied on behalf of the device.
    SharedAccessKey {
        policy_name: String,
        policy_key: String,
    },
    /// Caller-supplied time-boxed token.
    Token {
        token: String,
        expires_at: DateTime<Utc>,
    },
    /// Caller-supplied full connection string.
    ConnectionString { value: String },
}

// secrets stay out of logs
impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedAccessKey { policy_name, .. } => f
                .debug_struct("SharedAccessKey")
                .field("policy_name", policy_name)
                .finish_non_exhaustive(),
            Self::Token { expires_at, .. } => f
                .debug_struct("Token")
                .field("expires_at", expires_at)
                .finish_non_exhaustive(),
            Self::ConnectionString { .. } => {
                f.debug_struct("ConnectionString").finish_non_exhaustive()
            }
        }
    }
}

/// Connection pooling hints passed through to the transport implementation.
#[derive(Debug, Clone, Copy)]
pub struct PoolingOptions {
    /// Upper bound on devices multiplexed over one physical connection.
    pub max_pool_size: u16,
    /// Timeout applied to individual transport operations.
    pub operation_timeout: Duration,
}
