//! Stream metrics and status reporting

use std::io::Cursor;
use std::time::Instant;

use image::codecs::jpeg::JpegDecoder;
use image::{ImageDecoder, ImageResult};
use serde::Serialize;

use crate::device::{CounterSnapshot, StreamHealth, StreamState};

/// Decoded image dimensions and color model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    /// Color type as reported by the decoder (e.g. `Rgb8`, `L8`)
    pub color: String,
}

impl FrameGeometry {
    /// Read the geometry from a JPEG header without decoding pixels
    pub fn from_jpeg(payload: &[u8]) -> ImageResult<Self> {
        let decoder = JpegDecoder::new(Cursor::new(payload))?;
        let (width, height) = decoder.dimensions();

        Ok(Self {
            width,
            height,
            color: format!("{:?}", decoder.color_type()),
        })
    }
}

/// Values refreshed by the statistics sampler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamMetrics {
    /// Frames per second over the last sample window
    pub fps: f64,
    /// Bytes per second over the last sample window
    pub bps: f64,
    /// Geometry of a recently decoded frame
    pub geometry: Option<FrameGeometry>,
}

/// Turns cumulative counters into per-second rates
#[derive(Debug, Clone)]
pub struct RateWindow {
    last: CounterSnapshot,
    last_at: Instant,
}

impl RateWindow {
    /// Start a window at `now` from `counters`
    pub fn new(counters: CounterSnapshot, now: Instant) -> Self {
        Self {
            last: counters,
            last_at: now,
        }
    }

    /// Close the current window and open the next one
    ///
    /// Returns `(fps, bps)` normalized by the real elapsed time.
    pub fn sample(&mut self, counters: CounterSnapshot, now: Instant) -> (f64, f64) {
        let elapsed = now.saturating_duration_since(self.last_at);
        let frames = counters
            .frames_received
            .saturating_sub(self.last.frames_received);
        let bytes = counters
            .bytes_received
            .saturating_sub(self.last.bytes_received);

        self.last = counters;
        self.last_at = now;

        if elapsed.is_zero() {
            return (0.0, 0.0);
        }
        let secs = elapsed.as_secs_f64();
        (frames as f64 / secs, bytes as f64 / secs)
    }
}

/// Structured snapshot served by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub url: String,
    pub health: StreamHealth,
    /// Sequence number of the frame currently being filled
    pub current_frame: u64,
    pub subscribers: u32,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub counters: CounterSnapshot,
    #[serde(flatten)]
    pub metrics: StreamMetrics,
}

impl StatusReport {
    /// Collect the current status of `state`
    pub fn collect(state: &StreamState) -> Self {
        Self {
            url: state.source().to_string(),
            health: state.health(),
            current_frame: state.chain().current().sequence(),
            subscribers: state.subscriber_count(),
            uptime_secs: state.uptime().as_secs(),
            counters: state.counters(),
            metrics: state.metrics(),
        }
    }
}

/// Convenience for log lines
pub(crate) fn kilobytes(bytes_per_sec: f64) -> f64 {
    bytes_per_sec / 1024.0
}
