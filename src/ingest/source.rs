//! Source ingestion task
//!
//! The single producer of the frame chain. Each upstream part becomes one
//! frame; connection failures move the stream through the health machine
//! and are retried with exponential backoff.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::chain::FrameWriter;
use crate::device::StreamState;
use crate::error::UpstreamError;
use crate::protocol::Part;

use super::config::{Backoff, IngestConfig};
use super::connector::UpstreamConnection;

/// Pulls parts from the upstream and publishes them as frames
pub struct SourceIngest {
    config: IngestConfig,
    state: Arc<StreamState>,
    writer: FrameWriter,
}

impl SourceIngest {
    pub fn new(config: IngestConfig, state: Arc<StreamState>, writer: FrameWriter) -> Self {
        Self {
            config,
            state,
            writer,
        }
    }

    /// Run on a new task
    pub fn spawn(self) -> JoinHandle<Result<(), UpstreamError>> {
        tokio::spawn(self.run())
    }

    /// Ingest until the stream fails for good
    ///
    /// Only returns once the health is `Failed`; the error is
    /// the reason ingestion stopped.
    pub async fn run(mut self) -> Result<(), UpstreamError> {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut failures = 0u32;

        loop {
            let mut received = 0u64;
            let outcome = self.session(&mut received).await;

            // A session that delivered parts counts as a recovery
            if received > 0 {
                failures = 0;
                backoff.reset();
            }

            match outcome {
                Ok(()) => {
                    tracing::info!(source = %self.config.url, parts = received, "Upstream ended the stream");
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(source = %self.config.url, error = %e, "Upstream unusable, giving up");
                    self.give_up();
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(source = %self.config.url, error = %e, parts = received, "Upstream connection lost");
                }
            }

            failures += 1;
            let max = self.config.max_reconnect_attempts;
            if max != 0 && failures >= max {
                tracing::error!(source = %self.config.url, attempts = failures, "Reconnect attempts exhausted");
                self.give_up();
                return Err(UpstreamError::RetriesExhausted { attempts: failures });
            }

            self.state.set_health(self.state.health().on_disconnect());
            self.state.record_reconnect();

            let delay = backoff.next_delay();
            tracing::info!(
                source = %self.config.url,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to upstream"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One connection: connect, then publish parts until it ends
    async fn session(&mut self, received: &mut u64) -> Result<(), UpstreamError> {
        let mut conn = UpstreamConnection::connect(&self.config).await?;
        tracing::info!(
            source = %self.config.url,
            boundary = conn.boundary(),
            "Connected to upstream"
        );

        while let Some(part) = conn.next_part().await? {
            *received += 1;
            self.ingest_part(part);
        }
        Ok(())
    }

    /// Publish one part as the current tail frame
    fn ingest_part(&mut self, part: Part) {
        let declared = part.content_length();
        let body = part.into_body();
        let len = body.len();
        let damaged = len == 0 || declared.is_some_and(|declared| declared != len);

        let frame = self.writer.push(body, damaged);

        if damaged {
            self.state.record_lost();
            tracing::debug!(
                sequence = frame.sequence(),
                len = len,
                declared = ?declared,
                "Damaged frame"
            );
        } else {
            self.state.record_frame(len);
            self.state.set_health(self.state.health().on_frame());
        }
    }

    fn give_up(&self) {
        self.state.set_health(self.state.health().on_give_up());
    }
}
