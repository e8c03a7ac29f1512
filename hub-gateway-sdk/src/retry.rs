use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy with exponential backoff and an optional attempt cap.
///
/// Combines backoff parameters with attempt limits so one config type covers
/// every retry site (method handler registration today, future transport
/// reconnects).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryPolicy {
    /// Maximum number of attempts (None = unlimited).
    #[serde(default = "RetryPolicy::default_max_attempts")]
    pub max_attempts: Option<u32>,

    /// Initial retry interval in milliseconds.
    #[serde(default = "RetryPolicy::default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Maximum retry interval cap in milliseconds.
    #[serde(default = "RetryPolicy::default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Randomization factor in range [0.0, 1.0]; 0.2 means ±20% jitter.
    #[serde(default = "RetryPolicy::default_randomization_factor")]
    pub randomization_factor: f64,

    /// Multiplicative factor per retry step, typically 2.0.
    #[serde(default = "RetryPolicy::default_multiplier")]
    pub multiplier: f64,

    /// Optional total elapsed time cap in milliseconds.
    ///
    /// If both this and `max_attempts` are set, whichever is reached first
    /// stops the retries.
    #[serde(default = "RetryPolicy::default_max_elapsed_time_ms")]
    pub max_elapsed_time_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_interval_ms: Self::default_initial_interval_ms(),
            max_interval_ms: Self::default_max_interval_ms(),
            randomization_factor: Self::default_randomization_factor(),
            multiplier: Self::default_multiplier(),
            max_elapsed_time_ms: Self::default_max_elapsed_time_ms(),
        }
    }
}

impl RetryPolicy {
    fn default_max_attempts() -> Option<u32> {
        Some(3)
    }

    fn default_initial_interval_ms() -> u64 {
        1_000
    }

    fn default_max_interval_ms() -> u64 {
        30_000
    }

    fn default_randomization_factor() -> f64 {
        0.2
    }

    fn default_multiplier() -> f64 {
        2.0
    }

    fn default_max_elapsed_time_ms() -> Option<u64> {
        None
    }
}

/// Build an `ExponentialBackoff` from a [`RetryPolicy`].
///
/// `max_elapsed_time` limits retries by time; the caller checks
/// `max_attempts` separately.
pub fn build_exponential_backoff(policy: &RetryPolicy) -> ExponentialBackoff {
    let initial_interval = Duration::from_millis(policy.initial_interval_ms.max(1));
    ExponentialBackoff {
        // current_interval must start at the configured initial, not the
        // crate default carried in by the struct update
        current_interval: initial_interval,
        initial_interval,
        max_interval: Duration::from_millis(policy.max_interval_ms).max(initial_interval),
        randomization_factor: policy.randomization_factor.clamp(0.0, 1.0),
        multiplier: policy.multiplier.max(1.0),
        max_elapsed_time: policy.max_elapsed_time_ms.map(Duration::from_millis),
        ..ExponentialBackoff::default()
    }
}
