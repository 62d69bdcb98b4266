//! Completion gate
//!
//! Each frame owns a one-shot readiness signal. The producer stores the
//! payload into a set-once slot and then wakes every waiter; readers either
//! see the slot empty or see the final payload, never anything in between.

use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;

/// Payload of a completed frame
#[derive(Debug, Clone)]
pub struct Published {
    /// Frame bytes exactly as received from upstream
    pub payload: Bytes,
    /// Whether consumers should skip this frame
    pub damaged: bool,
}

/// One-shot readiness signal guarding a frame payload
#[derive(Debug, Default)]
pub struct CompletionGate {
    slot: OnceLock<Published>,
    notify: Notify,
}

impl CompletionGate {
    /// Create an open (unpublished) gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the payload has been published
    pub fn is_complete(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The published payload, if any
    pub fn get(&self) -> Option<&Published> {
        self.slot.get()
    }

    /// Publish the payload and wake all waiters
    ///
    /// Returns `false` (and changes nothing) if the gate was already
    /// completed.
    pub(super) fn complete(&self, published: Published) -> bool {
        if self.slot.set(published).is_err() {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Wait until the payload is published
    pub async fn wait(&self) -> &Published {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the slot so a publish in between is not missed
            notified.as_mut().enable();

            if let Some(published) = self.slot.get() {
                return published;
            }

            notified.await;
        }
    }

    /// Wait for the payload with an upper bound
    ///
    /// `Duration::ZERO` waits without a bound. Returns `None` on timeout.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<&Published> {
        if timeout.is_zero() {
            return Some(self.wait().await);
        }
        tokio::time::timeout(timeout, self.wait()).await.ok()
    }
}
