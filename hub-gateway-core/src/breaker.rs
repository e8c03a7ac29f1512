use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Per-session failure isolator.
///
/// Trips open after a configured number of consecutive failures and silently
/// rejects calls until the cooldown deadline passes. Reopening is purely
/// time-based; the first call after the deadline runs normally, there is no
/// half-open probe state.
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

enum BreakerState {
    Closed { consecutive_failures: u32 },
    Open { until: DateTime<Utc> },
}

impl CircuitBreaker {
    /// A threshold of zero would never admit a call, so it is raised to one.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Whether the guarded operation may run now.
    ///
    /// An elapsed cooldown flips the breaker back to closed as a side effect.
    pub fn allows_call(&self) -> bool {
        let mut state = self.lock_state();
        match *state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { until } => {
                if Utc::now() >= until {
                    *state = BreakerState::Closed {
                        consecutive_failures: 0,
                    };
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock_state();
        if let BreakerState::Closed { .. } = *state {
            *state = BreakerState::Closed {
                consecutive_failures: 0,
            };
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.lock_state();
        if let BreakerState::Closed {
            consecutive_failures,
        } = *state
        {
            let failures = consecutive_failures + 1;
            *state = if failures >= self.failure_threshold {
                BreakerState::Open {
                    until: Utc::now() + self.cooldown,
                }
            } else {
                BreakerState::Closed {
                    consecutive_failures: failures,
                }
            };
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
