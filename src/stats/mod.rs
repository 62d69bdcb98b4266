//! Statistics and metrics for the relayed stream

pub mod metrics;
pub mod sampler;

pub use metrics::{FrameGeometry, RateWindow, StatusReport, StreamMetrics};
pub use sampler::{refresh_geometry, StatsConfig, StatsSampler};
