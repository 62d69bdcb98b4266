//! mjpeg-relay: a Motion-JPEG stream relay
//!
//! Pulls one `multipart/x-mixed-replace` stream from a network camera and
//! serves it to any number of HTTP viewers, each at its own pace.
//!
//! # Architecture
//!
//! ```text
//!                 +-----------------+
//!   camera ──────►│  SourceIngest   │  single producer
//!                 +--------┬--------+
//!                          │ push
//!                          ▼
//!                 +-----------------+
//!                 │   FrameChain    │  [0]─►[1]─►[2]─►[tail]
//!                 +--┬─────┬─────┬--+
//!                    │     │     │
//!          ┌─────────┘     │     └──────────┐
//!          ▼               ▼                ▼
//!   viewer streams     snapshots      StatsSampler
//!   (/frame.mjpg)    (/frame.jpeg)     (/status)
//! ```
//!
//! All components share one [`StreamState`](device::StreamState); frames
//! are immutable once published.

pub mod chain;
pub mod device;
pub mod error;
pub mod ingest;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_utils;

pub use device::{StreamHealth, StreamState};
pub use error::{Error, Result};
pub use ingest::{IngestConfig, SourceIngest, UpstreamUrl};
pub use relay::{DeliveryMode, RelayConfig};
pub use server::{RelayServer, ServerConfig};
pub use stats::{StatsConfig, StatsSampler};
