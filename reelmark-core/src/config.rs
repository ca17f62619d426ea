use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for the write-back scheduler and the change bus.
///
/// All fields carry defaults so a partial payload only overrides what it
/// names.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period (ms) after the most recent enqueue before a flush.
    pub debounce_ms: u64,
    /// Background flush cadence (ms) while anything is pending.
    pub retry_interval_ms: u64,
    /// Growth of the background cadence across consecutive failures.
    pub retry: RetryConfig,
    /// Frames buffered per change-bus subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2_500,
            retry_interval_ms: 15_000,
            retry: RetryConfig::default(),
            event_capacity: 256,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Multiplier applied per consecutive failed cycle. `1.0` keeps the
    /// cadence fixed.
    pub backoff_factor: f32,
    /// Upper bound (ms) for the grown cadence.
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_factor: 1.0,
            max_interval_ms: 300_000,
        }
    }
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Delay before the next background attempt after `failures`
    /// consecutive failed cycles.
    pub fn retry_delay(&self, failures: u32) -> Duration {
        let base = self.retry_interval_ms as f64;
        let factor = f64::from(self.retry.backoff_factor.max(1.0));
        let cap = self.retry.max_interval_ms.max(self.retry_interval_ms) as f64;
        let grown = base * factor.powi(failures.min(64) as i32);
        Duration::from_millis(grown.min(cap) as u64)
    }
}
