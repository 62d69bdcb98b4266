//! Stream health state machine
//!
//! ```text
//!              first frame
//!   Starting ──────────────► Live ◄────────┐
//!      │                      │            │ frame after reconnect
//!      │ connect/read error   │ error/EOF  │
//!      └──────────────► Degraded ──────────┘
//!                             │
//!                             │ retries exhausted / fatal response
//!                             ▼
//!                           Failed
//! ```

use serde::Serialize;

/// Health of the upstream stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamHealth {
    /// No frame received yet
    Starting,
    /// Frames are arriving
    Live,
    /// Upstream lost, reconnecting
    Degraded,
    /// Ingestion stopped for good
    Failed,
}

impl StreamHealth {
    /// A frame was received
    pub fn on_frame(self) -> Self {
        match self {
            StreamHealth::Failed => StreamHealth::Failed,
            _ => StreamHealth::Live,
        }
    }

    /// The upstream connection failed or ended
    pub fn on_disconnect(self) -> Self {
        match self {
            StreamHealth::Failed => StreamHealth::Failed,
            _ => StreamHealth::Degraded,
        }
    }

    /// Ingestion gave up
    pub fn on_give_up(self) -> Self {
        StreamHealth::Failed
    }

    /// Whether ingestion has stopped
    pub fn is_failed(&self) -> bool {
        *self == StreamHealth::Failed
    }

    /// Whether frames are currently arriving
    pub fn is_live(&self) -> bool {
        *self == StreamHealth::Live
    }
}

impl std::fmt::Display for StreamHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StreamHealth::Starting => "starting",
            StreamHealth::Live => "live",
            StreamHealth::Degraded => "degraded",
            StreamHealth::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_lifecycle() {
        let health = StreamHealth::Starting;

        let health = health.on_frame();
        assert_eq!(health, StreamHealth::Live);
        assert!(health.is_live());

        let health = health.on_disconnect();
        assert_eq!(health, StreamHealth::Degraded);

        let health = health.on_frame();
        assert_eq!(health, StreamHealth::Live);

        let health = health.on_disconnect().on_give_up();
        assert!(health.is_failed());
    }

    #[test]
    fn test_starting_failure_degrades() {
        assert_eq!(
            StreamHealth::Starting.on_disconnect(),
            StreamHealth::Degraded
        );
    }

    #[test]
    fn test_failed_is_terminal() {
        let failed = StreamHealth::Failed;

        assert_eq!(failed.on_frame(), StreamHealth::Failed);
        assert_eq!(failed.on_disconnect(), StreamHealth::Failed);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&StreamHealth::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(StreamHealth::Live.to_string(), "live");
    }
}
