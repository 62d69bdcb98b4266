//! Periodic statistics sampler
//!
//! Once per interval the sampler turns the cumulative receive counters into
//! rates and, in a separate task, decodes the header of the current frame to
//! refresh the stream geometry. Geometry refresh is best effort: a timeout or
//! decode failure leaves the previous value in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::device::StreamState;

use super::metrics::{kilobytes, FrameGeometry, RateWindow};

/// Sampler configuration
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Time between samples
    pub interval: Duration,
    /// How long a geometry refresh waits for the current frame
    pub decode_timeout: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            decode_timeout: Duration::from_secs(1),
        }
    }
}

impl StatsConfig {
    /// Set the sampling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the geometry wait bound
    pub fn decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout = timeout;
        self
    }
}

/// Periodic rate and geometry sampler
pub struct StatsSampler {
    state: Arc<StreamState>,
    config: StatsConfig,
    window: RateWindow,
}

impl StatsSampler {
    /// Create a sampler whose first window starts now
    pub fn new(state: Arc<StreamState>, config: StatsConfig) -> Self {
        let window = RateWindow::new(state.counters(), Instant::now());
        Self {
            state,
            config,
            window,
        }
    }

    /// Take one sample
    ///
    /// Stores the rates immediately and returns the handle of the spawned
    /// geometry refresh.
    pub fn sample(&mut self) -> JoinHandle<Option<FrameGeometry>> {
        let (fps, bps) = self.window.sample(self.state.counters(), Instant::now());
        self.state.update_metrics(|metrics| {
            metrics.fps = fps;
            metrics.bps = bps;
        });

        tracing::info!(
            fps = format_args!("{fps:.2}"),
            kbps = format_args!("{:.2}", kilobytes(bps)),
            health = %self.state.health(),
            subscribers = self.state.subscriber_count(),
            "Stream statistics"
        );

        tokio::spawn(refresh_geometry(
            Arc::clone(&self.state),
            self.config.decode_timeout,
        ))
    }

    /// Sample forever at the configured interval
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sample();
        }
    }

    /// Spawn the sampling loop
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Decode the current frame's header and store its geometry
///
/// Waits up to `timeout` for the frame being filled to complete.
pub async fn refresh_geometry(state: Arc<StreamState>, timeout: Duration) -> Option<FrameGeometry> {
    let frame = state.chain().current();

    let published = match frame.wait_ready(timeout).await {
        Ok(published) => published,
        Err(err) => {
            tracing::debug!(error = %err, "Geometry refresh skipped");
            return None;
        }
    };
    if published.damaged {
        return None;
    }

    match FrameGeometry::from_jpeg(&published.payload) {
        Ok(geometry) => {
            state.update_metrics(|metrics| metrics.geometry = Some(geometry.clone()));
            Some(geometry)
        }
        Err(err) => {
            tracing::debug!(
                sequence = frame.sequence(),
                error = %err,
                "Frame geometry decode failed"
            );
            None
        }
    }
}
