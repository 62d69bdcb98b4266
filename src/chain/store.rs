//! Frame chain implementation
//!
//! The chain is split into a shared read side ([`FrameChain`]) and a
//! unique write side ([`FrameWriter`]). Only the writer can grow the chain,
//! so the single-producer rule is enforced by ownership rather than by
//! convention.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::watch;

use super::frame::Frame;

/// Read side of the frame chain
///
/// Cheap to clone; every clone observes the same tail.
#[derive(Debug, Clone)]
pub struct FrameChain {
    tail: watch::Receiver<Arc<Frame>>,
    latest: watch::Receiver<Option<Arc<Frame>>>,
}

/// Write side of the frame chain, held by the ingestion task
#[derive(Debug)]
pub struct FrameWriter {
    tail: watch::Sender<Arc<Frame>>,
    latest: watch::Sender<Option<Arc<Frame>>>,
}

impl FrameChain {
    /// Create an empty chain
    ///
    /// The chain starts with a single unpublished frame (sequence 0) as its
    /// tail.
    pub fn new() -> (FrameChain, FrameWriter) {
        let (tail_tx, tail_rx) = watch::channel(Arc::new(Frame::new(0)));
        let (latest_tx, latest_rx) = watch::channel(None);

        let chain = FrameChain {
            tail: tail_rx,
            latest: latest_rx,
        };
        let writer = FrameWriter {
            tail: tail_tx,
            latest: latest_tx,
        };

        (chain, writer)
    }

    /// The frame currently being filled
    pub fn current(&self) -> Arc<Frame> {
        self.tail.borrow().clone()
    }

    /// The most recently published undamaged frame
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.borrow().clone()
    }

    /// Number of frames published so far (damaged ones included)
    pub fn published_count(&self) -> u64 {
        self.tail.borrow().sequence()
    }

    /// Whether any frame has ever been published
    pub fn has_frames(&self) -> bool {
        self.published_count() > 0
    }
}

impl FrameWriter {
    /// The frame currently being filled
    pub fn tail(&self) -> Arc<Frame> {
        self.tail.borrow().clone()
    }

    /// Link a new empty frame after the current tail and return it
    ///
    /// Calling this twice before [`advance`](Self::advance) returns the same
    /// successor.
    pub fn append(&mut self) -> Arc<Frame> {
        let tail = self.tail();
        let next = Arc::new(Frame::new(tail.sequence() + 1));
        tail.link(next).clone()
    }

    /// Fill `frame` and mark it complete
    ///
    /// The payload is stored before the completion flag becomes visible.
    /// Returns `false` if the frame had already been published.
    pub fn publish(&mut self, frame: &Arc<Frame>, payload: Bytes, damaged: bool) -> bool {
        if !frame.publish(payload, damaged) {
            return false;
        }
        if !damaged {
            self.latest.send_replace(Some(frame.clone()));
        }
        true
    }

    /// Make `new_tail` the frame currently being filled
    pub fn advance(&mut self, new_tail: Arc<Frame>) {
        self.tail.send_replace(new_tail);
    }

    /// Publish the current tail and move on to its successor
    ///
    /// The successor is linked before the current tail is published, so a
    /// reader woken by the publication always finds `next` in place.
    /// Returns the frame that was published.
    pub fn push(&mut self, payload: Bytes, damaged: bool) -> Arc<Frame> {
        let next = self.append();
        let current = self.tail();
        self.publish(&current, payload, damaged);
        self.advance(next);
        current
    }
}
