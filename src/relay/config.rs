//! Distribution options

use std::time::Duration;

/// Options shared by every downstream viewer
///
/// With the default `max_sequential_lag` a sequential viewer is not
/// guaranteed every frame: one that falls more than 300 frames behind skips
/// ahead to the tail. Set it to 0 to deliver every frame regardless of lag.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How far a sequential viewer may fall behind the tail before it is
    /// moved to the tail (0 = unbounded)
    pub max_sequential_lag: u64,

    /// How long a snapshot waits for the tail to complete
    pub snapshot_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_sequential_lag: 300,
            snapshot_timeout: Duration::from_secs(1),
        }
    }
}

impl RelayConfig {
    /// Set the sequential lag limit
    pub fn max_sequential_lag(mut self, frames: u64) -> Self {
        self.max_sequential_lag = frames;
        self
    }

    /// Set the snapshot wait
    pub fn snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();

        assert_eq!(config.max_sequential_lag, 300);
        assert_eq!(config.snapshot_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_unbounded_lag() {
        let config = RelayConfig::default()
            .max_sequential_lag(0)
            .snapshot_timeout(Duration::from_millis(250));

        assert_eq!(config.max_sequential_lag, 0);
        assert_eq!(config.snapshot_timeout, Duration::from_millis(250));
    }
}
