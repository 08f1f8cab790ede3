use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What a watcher does when the file becomes shorter than its read offset
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Reset the read offset to 0 and deliver the file again from its start
    #[default]
    Resync,
    /// Treat the current size as the new end of file and deliver only later appends
    WaitForGrowth,
}

/// Tuning for watchers and subscriber delivery
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TailConfig {
    /// Interval between two growth checks of a watched file (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of each subscriber's line queue.
    /// A subscriber whose queue overflows is evicted.
    #[serde(default = "default_subscriber_buffer_size")]
    pub subscriber_buffer_size: usize,

    /// Upper bound of bytes read from a file in one read call
    #[serde(default = "default_max_read_bytes_per_tick")]
    pub max_read_bytes_per_tick: u64,

    /// Consecutive failed detection cycles before a watcher gives up (0 = never)
    #[serde(default = "default_max_consecutive_read_failures")]
    pub max_consecutive_read_failures: u32,

    #[serde(default)]
    pub truncation_policy: TruncationPolicy,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            subscriber_buffer_size: default_subscriber_buffer_size(),
            max_read_bytes_per_tick: default_max_read_bytes_per_tick(),
            max_consecutive_read_failures: default_max_consecutive_read_failures(),
            truncation_policy: TruncationPolicy::default(),
        }
    }
}

impl TailConfig {
    /// Validates tail configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when any bound is zero
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_ms must be at least 1ms".into(),
            ));
        }

        if self.subscriber_buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "subscriber_buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_read_bytes_per_tick == 0 {
            return Err(Error::InvalidConfig(
                "max_read_bytes_per_tick must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}
fn default_subscriber_buffer_size() -> usize {
    1024
}
fn default_max_read_bytes_per_tick() -> u64 {
    // 8 MiB
    8 * 1024 * 1024
}
fn default_max_consecutive_read_failures() -> u32 {
    10
}
