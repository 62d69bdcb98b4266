//! Protocol constants

/// Boundary token announced to downstream clients
pub const DOWNSTREAM_BOUNDARY: &str = "--myboundary";

/// Content type of the downstream live stream
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=--myboundary";

/// Content type of each downstream part and of snapshots
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Default HTTP port when the upstream URL has none
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Upper bound on an HTTP response head or a part header block
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// Default upper bound on a single part body
pub const DEFAULT_MAX_PART_SIZE: usize = 16 * 1024 * 1024;

/// User agent sent to the upstream source
pub const USER_AGENT: &str = concat!("mjpeg-relay/", env!("CARGO_PKG_VERSION"));
