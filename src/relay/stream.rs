//! Per-viewer frame delivery
//!
//! A viewer holds a cursor into the frame chain. Sequential cursors follow
//! `next` links and see every undamaged frame; latest-join cursors re-read
//! the tail on every tick and see only the newest one.
//!
//! ```text
//!            seq 40     seq 41     seq 42     tail (43)
//!   ... ──► [done] ──► [done] ──► [done] ──► [open]
//!              ▲                                ▲
//!      sequential cursor               latest-join cursor
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream};
use tokio::sync::watch;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::chain::{Frame, FrameChain};
use crate::device::{StreamHealth, StreamState, SubscriberGuard};
use crate::protocol::mjpeg::encode_part;

use super::config::RelayConfig;
use super::mode::{DeliveryMode, MIN_FRAME_INTERVAL};

/// A frame handed to a viewer
#[derive(Debug, Clone)]
pub struct DeliveredFrame {
    pub sequence: u64,
    pub payload: Bytes,
}

/// Walks the chain one frame at a time
#[derive(Debug)]
pub struct SequentialCursor {
    chain: FrameChain,
    frame: Arc<Frame>,
    max_lag: u64,
}

impl SequentialCursor {
    /// Start at the current tail
    pub fn new(chain: FrameChain, max_lag: u64) -> Self {
        let frame = chain.current();
        Self {
            chain,
            frame,
            max_lag,
        }
    }

    /// Sequence of the frame the cursor waits on
    pub fn position(&self) -> u64 {
        self.frame.sequence()
    }

    /// Next undamaged frame in chain order
    pub async fn next_frame(&mut self) -> DeliveredFrame {
        loop {
            self.catch_up();

            let published = self.frame.ready().await.clone();
            let frame = self.frame.clone();
            self.frame = match frame.next() {
                Some(next) => next.clone(),
                None => self.chain.current(),
            };

            if published.damaged {
                continue;
            }
            return DeliveredFrame {
                sequence: frame.sequence(),
                payload: published.payload,
            };
        }
    }

    fn catch_up(&mut self) {
        if self.max_lag == 0 {
            return;
        }
        let tail = self.chain.current();
        let lag = tail.sequence().saturating_sub(self.frame.sequence());
        if lag > self.max_lag {
            tracing::warn!(
                from = self.frame.sequence(),
                to = tail.sequence(),
                skipped = lag,
                "Sequential viewer fell behind, jumping to the tail"
            );
            self.frame = tail;
        }
    }
}

/// Follows the tail at a fixed rate
#[derive(Debug)]
pub struct LatestCursor {
    chain: FrameChain,
    ticker: Interval,
    last: Option<u64>,
}

impl LatestCursor {
    /// Emit at most once per `period`
    pub fn new(chain: FrameChain, period: Duration) -> Self {
        let mut ticker = interval(period.max(MIN_FRAME_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            chain,
            ticker,
            last: None,
        }
    }

    /// Sequence of the last frame handed out
    pub fn last_sequence(&self) -> Option<u64> {
        self.last
    }

    /// Wait for the next tick, then the next frame to complete
    ///
    /// Damaged frames and frames not newer than the previous emission are
    /// passed over.
    pub async fn next_frame(&mut self) -> DeliveredFrame {
        self.ticker.tick().await;

        let mut frame = self.chain.current();
        loop {
            let published = frame.ready().await.clone();
            let newer = self.last.map_or(true, |last| frame.sequence() > last);
            if !published.damaged && newer {
                self.last = Some(frame.sequence());
                return DeliveredFrame {
                    sequence: frame.sequence(),
                    payload: published.payload,
                };
            }

            let tail = self.chain.current();
            frame = if tail.sequence() > frame.sequence() {
                tail
            } else {
                frame.next().cloned().unwrap_or(tail)
            };
        }
    }
}

/// Cursor for either delivery mode
#[derive(Debug)]
pub enum FrameCursor {
    Sequential(SequentialCursor),
    Latest(LatestCursor),
}

impl FrameCursor {
    /// Cursor at the current tail of `chain`
    pub fn new(chain: FrameChain, mode: DeliveryMode, config: &RelayConfig) -> Self {
        match mode.frame_interval() {
            Some(period) => FrameCursor::Latest(LatestCursor::new(chain, period)),
            None => {
                FrameCursor::Sequential(SequentialCursor::new(chain, config.max_sequential_lag))
            }
        }
    }

    pub async fn next_frame(&mut self) -> DeliveredFrame {
        match self {
            FrameCursor::Sequential(cursor) => cursor.next_frame().await,
            FrameCursor::Latest(cursor) => cursor.next_frame().await,
        }
    }
}

/// One connected viewer
struct ViewerSession {
    client_id: u64,
    mode: DeliveryMode,
    cursor: FrameCursor,
    health: watch::Receiver<StreamHealth>,
    delivered: u64,
    _guard: SubscriberGuard,
}

impl ViewerSession {
    async fn next_frame(&mut self) -> Option<DeliveredFrame> {
        tokio::select! {
            frame = self.cursor.next_frame() => Some(frame),
            _ = stream_failed(&mut self.health) => {
                tracing::info!(client_id = self.client_id, "Stream failed, ending viewer stream");
                None
            }
        }
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        tracing::info!(
            client_id = self.client_id,
            mode = %self.mode,
            delivered = self.delivered,
            "Viewer disconnected"
        );
    }
}

/// Resolves once the health is `Failed`
async fn stream_failed(health: &mut watch::Receiver<StreamHealth>) {
    if health.wait_for(StreamHealth::is_failed).await.is_err() {
        // Sender gone: the health can no longer change
        std::future::pending::<()>().await;
    }
}

/// Encoded multipart parts for one viewer
///
/// The viewer starts at the current tail and stays counted as a subscriber
/// until the stream is dropped. The stream ends when the health becomes
/// `Failed`.
pub fn mjpeg_stream(
    state: Arc<StreamState>,
    mode: DeliveryMode,
    config: &RelayConfig,
    client_id: u64,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let session = ViewerSession {
        client_id,
        mode,
        cursor: FrameCursor::new(state.chain().clone(), mode, config),
        health: state.watch_health(),
        delivered: 0,
        _guard: state.subscribe(),
    };
    tracing::info!(
        client_id = client_id,
        mode = %mode,
        start = state.chain().published_count(),
        "Viewer connected"
    );

    stream::unfold(session, |mut session| async move {
        let frame = session.next_frame().await?;
        session.delivered += 1;
        tracing::trace!(
            client_id = session.client_id,
            sequence = frame.sequence,
            "Frame delivered"
        );
        Some((Ok(encode_part(&frame.payload)), session))
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    fn period(fps: u32) -> Duration {
        DeliveryMode::from_fps(fps).frame_interval().unwrap()
    }

    #[tokio::test]
    async fn test_sequential_delivers_all_in_order() {
        let (chain, mut writer) = FrameChain::new();
        let mut cursor = SequentialCursor::new(chain, 0);

        writer.push(Bytes::from_static(b"a"), false);
        writer.push(Bytes::from_static(b"bad"), true);
        writer.push(Bytes::from_static(b"b"), false);
        writer.push(Bytes::from_static(b"c"), false);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let frame = cursor.next_frame().await;
            seen.push((frame.sequence, frame.payload));
        }

        assert_eq!(
            seen,
            vec![
                (0, Bytes::from_static(b"a")),
                (2, Bytes::from_static(b"b")),
                (3, Bytes::from_static(b"c")),
            ]
        );
        assert_eq!(cursor.position(), 4);
    }

    #[tokio::test]
    async fn test_sequential_waits_for_producer() {
        let (chain, mut writer) = FrameChain::new();
        let mut cursor = SequentialCursor::new(chain, 0);

        let mut next = tokio_test::task::spawn(cursor.next_frame());
        assert_pending!(next.poll());

        writer.push(Bytes::from_static(b"x"), false);
        assert!(next.is_woken());
        let frame = assert_ready!(next.poll());
        assert_eq!(frame.sequence, 0);
    }

    #[tokio::test]
    async fn test_sequential_lag_jumps_to_tail() {
        let (chain, mut writer) = FrameChain::new();
        let mut cursor = SequentialCursor::new(chain, 2);

        for i in 0..5u8 {
            writer.push(Bytes::from(vec![i]), false);
        }

        let mut next = tokio_test::task::spawn(cursor.next_frame());
        // Jumped to the open tail (sequence 5)
        assert_pending!(next.poll());

        writer.push(Bytes::from_static(b"fresh"), false);
        let frame = assert_ready!(next.poll());
        assert_eq!(frame.sequence, 5);
        assert_eq!(frame.payload, Bytes::from_static(b"fresh"));
    }

    #[tokio::test]
    async fn test_sequential_within_lag_keeps_order() {
        let (chain, mut writer) = FrameChain::new();
        let mut cursor = SequentialCursor::new(chain, 3);

        for i in 0..3u8 {
            writer.push(Bytes::from(vec![i]), false);
        }

        assert_eq!(cursor.next_frame().await.sequence, 0);
        assert_eq!(cursor.next_frame().await.sequence, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_waits_for_newer_frame() {
        let (chain, mut writer) = FrameChain::new();
        writer.push(Bytes::from_static(b"old-1"), false);
        writer.push(Bytes::from_static(b"old-2"), false);

        let mut cursor = LatestCursor::new(chain, period(10));

        let mut next = tokio_test::task::spawn(cursor.next_frame());
        assert_pending!(next.poll());

        writer.push(Bytes::from_static(b"damaged"), true);
        assert_pending!(next.poll());

        writer.push(Bytes::from_static(b"new"), false);
        let frame = assert_ready!(next.poll());
        assert_eq!(frame.sequence, 3);
        assert_eq!(frame.payload, Bytes::from_static(b"new"));
        drop(next);

        assert_eq!(cursor.last_sequence(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_paces_by_rate() {
        let (chain, mut writer) = FrameChain::new();
        let producer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(1)).await;
                writer.push(Bytes::from_static(b"f"), false);
            }
        });

        let mut cursor = LatestCursor::new(chain, period(10));
        let start = tokio::time::Instant::now();

        let mut sequences = Vec::new();
        for _ in 0..5 {
            sequences.push(cursor.next_frame().await.sequence);
        }

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "elapsed {elapsed:?}");
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
        // Frames produced between ticks are dropped
        assert!(sequences[4] - sequences[0] > 4);

        producer.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_for_extreme_rate() {
        let (chain, mut writer) = FrameChain::new();
        let mode = DeliveryMode::from_query(Some("2000000000"));

        let mut cursor = FrameCursor::new(chain, mode, &RelayConfig::default());
        assert!(matches!(cursor, FrameCursor::Latest(_)));

        let mut next = tokio_test::task::spawn(cursor.next_frame());
        assert_pending!(next.poll());

        writer.push(Bytes::from_static(b"fast"), false);
        let frame = assert_ready!(next.poll());
        assert_eq!(frame.payload, Bytes::from_static(b"fast"));
    }

    #[tokio::test]
    async fn test_mjpeg_stream_encodes_and_counts_viewer() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        let stream = mjpeg_stream(state.clone(), DeliveryMode::Sequential, &RelayConfig::default(), 1);
        futures::pin_mut!(stream);
        assert_eq!(state.subscriber_count(), 1);

        writer.push(Bytes::from_static(b"jpeg"), false);

        let part = stream.next().await.unwrap().unwrap();
        assert_eq!(part, encode_part(b"jpeg"));
    }

    #[tokio::test]
    async fn test_mjpeg_stream_drop_releases_viewer() {
        let (state, _writer) = StreamState::new("http://cam/video");
        let stream = mjpeg_stream(state.clone(), DeliveryMode::from_fps(5), &RelayConfig::default(), 2);
        assert_eq!(state.subscriber_count(), 1);

        drop(stream);
        assert_eq!(state.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_mjpeg_stream_ends_on_failure() {
        let (state, _writer) = StreamState::new("http://cam/video");
        let stream = mjpeg_stream(state.clone(), DeliveryMode::Sequential, &RelayConfig::default(), 3);
        futures::pin_mut!(stream);

        let mut next = tokio_test::task::spawn(stream.next());
        assert_pending!(next.poll());

        state.set_health(StreamHealth::Failed);
        assert!(assert_ready!(next.poll()).is_none());
    }
}
