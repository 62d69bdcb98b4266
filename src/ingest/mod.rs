//! Upstream ingestion
//!
//! Connects to the camera, splits its multipart body into parts and
//! publishes each part on the frame chain.

pub mod config;
pub mod connector;
pub mod source;

pub use config::{Backoff, IngestConfig, UpstreamUrl};
pub use connector::{ResponseHead, UpstreamConnection};
pub use source::SourceIngest;
