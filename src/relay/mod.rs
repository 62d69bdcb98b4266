//! Downstream distribution
//!
//! Turns the frame chain into viewer streams and single-frame snapshots.

pub mod config;
pub mod mode;
pub mod snapshot;
pub mod stream;

pub use config::RelayConfig;
pub use mode::DeliveryMode;
pub use snapshot::{snapshot, SnapshotError};
pub use stream::{mjpeg_stream, DeliveredFrame, FrameCursor, LatestCursor, SequentialCursor};
