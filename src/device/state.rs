//! Shared stream record
//!
//! [`StreamState`] is the one mutable root of the relay. It is created once,
//! wrapped in an `Arc` and handed to every component at construction.
//!
//! Each mutable field has exactly one writer:
//!
//! | Field                    | Writer              |
//! |--------------------------|---------------------|
//! | chain tail               | ingestion (`FrameWriter`) |
//! | receive counters, health | ingestion           |
//! | metrics                  | statistics sampler  |
//! | subscriber count         | subscriber guards   |

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

use crate::chain::{FrameChain, FrameWriter};
use crate::stats::StreamMetrics;

use super::health::StreamHealth;

/// Cumulative receive counters
#[derive(Debug, Default)]
struct Counters {
    bytes_received: AtomicU64,
    frames_received: AtomicU64,
    frames_lost: AtomicU64,
    last_frame_bytes: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of the receive counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Bytes of good frames received
    pub bytes_received: u64,
    /// Good frames received
    pub frames_received: u64,
    /// Damaged frames received
    pub frames_lost: u64,
    /// Size of the last good frame
    pub last_frame_bytes: u64,
    /// Reconnection attempts
    pub reconnects: u64,
}

/// Shared state for one upstream stream
#[derive(Debug)]
pub struct StreamState {
    source: String,
    chain: FrameChain,
    counters: Counters,
    health: watch::Sender<StreamHealth>,
    metrics: watch::Sender<StreamMetrics>,
    subscribers: AtomicU32,
    started_at: Instant,
}

impl StreamState {
    /// Create the state for `source`
    ///
    /// Returns the shared state and the chain's write side, which belongs to
    /// the ingestion task.
    pub fn new(source: impl Into<String>) -> (Arc<Self>, FrameWriter) {
        let (chain, writer) = FrameChain::new();
        let (health, _) = watch::channel(StreamHealth::Starting);
        let (metrics, _) = watch::channel(StreamMetrics::default());

        let state = Arc::new(Self {
            source: source.into(),
            chain,
            counters: Counters::default(),
            health,
            metrics,
            subscribers: AtomicU32::new(0),
            started_at: Instant::now(),
        });

        (state, writer)
    }

    /// Upstream address
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Read side of the frame chain
    pub fn chain(&self) -> &FrameChain {
        &self.chain
    }

    /// Current health
    pub fn health(&self) -> StreamHealth {
        *self.health.borrow()
    }

    /// Receiver notified on every health change
    pub fn watch_health(&self) -> watch::Receiver<StreamHealth> {
        self.health.subscribe()
    }

    /// Move to `next` health, logging real transitions
    pub fn set_health(&self, next: StreamHealth) {
        self.health.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::info!(
                source = %self.source,
                from = %current,
                to = %next,
                "Stream health changed"
            );
            *current = next;
            true
        });
    }

    /// Latest sampled metrics
    pub fn metrics(&self) -> StreamMetrics {
        self.metrics.borrow().clone()
    }

    /// Modify the sampled metrics in place
    pub fn update_metrics(&self, update: impl FnOnce(&mut StreamMetrics)) {
        self.metrics.send_modify(update);
    }

    /// Count a good frame of `bytes` bytes
    pub fn record_frame(&self, bytes: usize) {
        let bytes = bytes as u64;
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        self.counters.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.counters.last_frame_bytes.store(bytes, Ordering::Relaxed);
    }

    /// Count a damaged frame
    pub fn record_lost(&self) {
        self.counters.frames_lost.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a reconnection attempt
    pub fn record_reconnect(&self) {
        self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy of the receive counters
    pub fn counters(&self) -> CounterSnapshot {
        CounterSnapshot {
            bytes_received: self.counters.bytes_received.load(Ordering::Relaxed),
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            frames_lost: self.counters.frames_lost.load(Ordering::Relaxed),
            last_frame_bytes: self.counters.last_frame_bytes.load(Ordering::Relaxed),
            reconnects: self.counters.reconnects.load(Ordering::Relaxed),
        }
    }

    /// Register a downstream viewer for as long as the guard lives
    pub fn subscribe(self: &Arc<Self>) -> SubscriberGuard {
        let count = self.subscribers.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(subscribers = count, "Subscriber added");
        SubscriberGuard {
            state: Arc::clone(self),
        }
    }

    /// Number of active downstream viewers
    pub fn subscriber_count(&self) -> u32 {
        self.subscribers.load(Ordering::Relaxed)
    }

    /// Time since the state was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Keeps a viewer counted in [`StreamState::subscriber_count`]
#[derive(Debug)]
pub struct SubscriberGuard {
    state: Arc<StreamState>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let prev = self.state.subscribers.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(subscribers = prev.saturating_sub(1), "Subscriber removed");
    }
}
