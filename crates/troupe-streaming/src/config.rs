//! Streaming timeouts.

use std::time::Duration;

/// Time limits for one streamed turn. Expiry fails the turn like any other
/// stream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Until the completion API answers with response headers.
    pub connect_timeout: Duration,
    /// Maximum silence between two chunks.
    pub idle_timeout: Duration,
    /// Hard ceiling for the whole turn, measured from the request.
    pub total_timeout: Duration,
}

impl StreamConfig {
    /// Build from whole seconds.
    #[must_use]
    pub fn from_secs(connect: u64, idle: u64, total: u64) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect),
            idle_timeout: Duration::from_secs(idle),
            total_timeout: Duration::from_secs(total),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from_secs(30, 60, 300)
    }
}
