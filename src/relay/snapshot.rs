//! Single-frame snapshots

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

use crate::device::StreamState;

/// Why no snapshot could be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("No frames received")]
    NotReady,

    #[error("No frame completed within {0:?}")]
    Timeout(Duration),

    #[error("Upstream stream has failed")]
    Unavailable,
}

/// The next frame to complete, as a standalone JPEG
///
/// Waits up to `timeout` for the current tail. If the tail turns out
/// damaged, the most recent undamaged frame is returned instead.
pub async fn snapshot(state: &StreamState, timeout: Duration) -> Result<Bytes, SnapshotError> {
    if state.health().is_failed() {
        return Err(SnapshotError::Unavailable);
    }

    let chain = state.chain();
    if !chain.has_frames() {
        return Err(SnapshotError::NotReady);
    }

    let tail = chain.current();
    match tail.wait_ready(timeout).await {
        Ok(published) if !published.damaged => Ok(published.payload.clone()),
        Ok(_) => chain
            .latest()
            .and_then(|frame| frame.payload().cloned())
            .ok_or(SnapshotError::NotReady),
        Err(e) => {
            tracing::debug!(error = %e, "Snapshot wait timed out");
            Err(SnapshotError::Timeout(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::device::StreamHealth;

    use super::*;

    #[tokio::test]
    async fn test_not_ready_before_first_frame() {
        let (state, _writer) = StreamState::new("http://cam/video");

        let err = snapshot(&state, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, SnapshotError::NotReady);
    }

    #[tokio::test]
    async fn test_returns_next_completed_frame() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        writer.push(Bytes::from_static(b"first"), false);

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.push(Bytes::from_static(b"\xFF\xD8second\xFF\xD9"), false);
            writer
        });

        let jpeg = snapshot(&state, Duration::from_secs(5)).await.unwrap();
        assert_eq!(jpeg, Bytes::from_static(b"\xFF\xD8second\xFF\xD9"));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_damaged_tail_falls_back_to_latest_good() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        writer.push(Bytes::from_static(b"good"), false);

        let producer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.push(Bytes::new(), true);
            writer
        });

        let jpeg = snapshot(&state, Duration::from_secs(5)).await.unwrap();
        assert_eq!(jpeg, Bytes::from_static(b"good"));
        producer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_new_frame() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        writer.push(Bytes::from_static(b"stale"), false);

        let err = snapshot(&state, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, SnapshotError::Timeout(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_unavailable_after_failure() {
        let (state, mut writer) = StreamState::new("http://cam/video");
        writer.push(Bytes::from_static(b"frame"), false);
        state.set_health(StreamHealth::Failed);

        let err = snapshot(&state, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err, SnapshotError::Unavailable);
    }
}
