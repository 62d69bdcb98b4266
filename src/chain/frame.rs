//! Frame node
//!
//! A [`Frame`] is one link of the chain: a sequence number, a completion
//! gate holding the payload, and a set-once link to its successor.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;

use super::error::ChainError;
use super::gate::{CompletionGate, Published};

/// One unit of the video stream
pub struct Frame {
    sequence: u64,
    gate: CompletionGate,
    next: OnceLock<Arc<Frame>>,
}

impl Frame {
    pub(super) fn new(sequence: u64) -> Self {
        Self {
            sequence,
            gate: CompletionGate::new(),
            next: OnceLock::new(),
        }
    }

    /// Position of this frame in the stream, starting at 0
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether the payload has been published
    pub fn is_complete(&self) -> bool {
        self.gate.is_complete()
    }

    /// Whether the frame was published as damaged
    ///
    /// Unpublished frames are not damaged.
    pub fn is_damaged(&self) -> bool {
        self.gate.get().is_some_and(|p| p.damaged)
    }

    /// The payload, once published
    pub fn payload(&self) -> Option<&Bytes> {
        self.gate.get().map(|p| &p.payload)
    }

    /// The successor, once linked
    ///
    /// Always present for a completed frame.
    pub fn next(&self) -> Option<&Arc<Frame>> {
        self.next.get()
    }

    /// Wait for publication without a bound
    pub async fn ready(&self) -> &Published {
        self.gate.wait().await
    }

    /// Wait for publication
    ///
    /// `Duration::ZERO` waits indefinitely; otherwise fails with
    /// [`ChainError::WaitTimeout`] once `timeout` has elapsed.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<&Published, ChainError> {
        self.gate
            .wait_timeout(timeout)
            .await
            .ok_or(ChainError::WaitTimeout {
                sequence: self.sequence,
                timeout,
            })
    }

    pub(super) fn link(&self, next: Arc<Frame>) -> &Arc<Frame> {
        self.next.get_or_init(|| next)
    }

    pub(super) fn publish(&self, payload: Bytes, damaged: bool) -> bool {
        self.gate.complete(Published { payload, damaged })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("complete", &self.is_complete())
            .field("damaged", &self.is_damaged())
            .field("len", &self.payload().map(Bytes::len))
            .field("linked", &self.next.get().is_some())
            .finish()
    }
}

impl Drop for Frame {
    // Unlink iteratively: a consumer releasing a long run of frames at once
    // would otherwise recurse once per frame.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(frame) = next {
            next = match Arc::into_inner(frame) {
                Some(mut frame) => frame.next.take(),
                None => None,
            };
        }
    }
}
