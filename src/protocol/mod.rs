//! Wire formats
//!
//! - [`mime`]: `Content-Type` parsing for the upstream response
//! - [`quirks`]: boundary transforms for non-conformant devices
//! - [`multipart`]: upstream multipart demultiplexing
//! - [`mjpeg`]: downstream part framing

pub mod constants;
pub mod mime;
pub mod mjpeg;
pub mod multipart;
pub mod quirks;

pub use mime::MediaType;
pub use multipart::{MultipartDemuxer, Part};
pub use quirks::BoundaryQuirk;
