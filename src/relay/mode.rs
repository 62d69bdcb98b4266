//! Viewer delivery modes

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

/// Shortest pacing period handed to the latest-join ticker
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_nanos(1);

/// How a viewer walks the frame chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Every frame in order, as fast as the viewer reads
    #[default]
    Sequential,
    /// The newest frame at most `fps` times per second
    LatestJoin { fps: NonZeroU32 },
}

impl DeliveryMode {
    /// Mode for a requested rate; 0 selects [`DeliveryMode::Sequential`]
    pub fn from_fps(fps: u32) -> Self {
        match NonZeroU32::new(fps) {
            Some(fps) => DeliveryMode::LatestJoin { fps },
            None => DeliveryMode::Sequential,
        }
    }

    /// Mode for the `fps` query value
    ///
    /// Absent or unparsable values select sequential delivery.
    pub fn from_query(fps: Option<&str>) -> Self {
        fps.and_then(|fps| fps.trim().parse::<u32>().ok())
            .map_or(DeliveryMode::Sequential, Self::from_fps)
    }

    /// Time between emissions in latest-join mode
    pub fn frame_interval(&self) -> Option<Duration> {
        match self {
            DeliveryMode::Sequential => None,
            // Rates above 1 GHz would round the period down to zero
            DeliveryMode::LatestJoin { fps } => {
                Some((Duration::from_secs(1) / fps.get()).max(MIN_FRAME_INTERVAL))
            }
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Sequential => write!(f, "sequential"),
            DeliveryMode::LatestJoin { fps } => write!(f, "latest@{fps}fps"),
        }
    }
}
