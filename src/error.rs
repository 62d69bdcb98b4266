//! Error types
//!
//! Errors are layered the same way the relay is: framing problems on the
//! wire ([`ProtocolError`]) are wrapped by the upstream connection
//! ([`UpstreamError`]), which in turn is one of the sources of the crate-wide
//! [`Error`].

use std::time::Duration;

use thiserror::Error;

use crate::chain::ChainError;
use crate::relay::SnapshotError;

/// Result type alias using the crate error
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Frame chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Multipart and header framing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    #[error("Not a multipart media type: {0}")]
    NotMultipart(String),

    #[error("Multipart media type has no boundary parameter")]
    MissingBoundary,

    #[error("Multipart boundary is empty after transform")]
    EmptyBoundary,

    #[error("Malformed HTTP response: {0}")]
    MalformedResponse(String),

    #[error("Malformed multipart part: {0}")]
    MalformedPart(String),

    #[error("Header block exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    #[error("Part exceeds {limit} bytes")]
    PartTooLarge { limit: usize },
}

/// Errors raised while talking to the upstream source
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Invalid upstream URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Upstream {0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("Upstream answered with status {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Upstream response has no Content-Type header")]
    MissingContentType,

    #[error("Upstream closed the connection mid-stream")]
    Closed,

    #[error("Gave up after {attempts} consecutive failed connection attempts")]
    RetriesExhausted { attempts: u32 },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpstreamError {
    /// Whether reconnecting could fix this error
    ///
    /// Transport failures are transient. A response that is not a usable
    /// multipart stream, or a URL we cannot use, will not improve by retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Connect { .. }
            | UpstreamError::Timeout(..)
            | UpstreamError::Closed
            | UpstreamError::Io(_) => true,
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::Protocol(err) => matches!(
                err,
                ProtocolError::MalformedPart(_) | ProtocolError::PartTooLarge { .. }
            ),
            UpstreamError::InvalidUrl { .. }
            | UpstreamError::UnsupportedScheme(_)
            | UpstreamError::MissingContentType
            | UpstreamError::RetriesExhausted { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(UpstreamError::Closed.is_retryable());
        assert!(UpstreamError::Timeout("read", Duration::from_secs(1)).is_retryable());
        assert!(UpstreamError::Io(std::io::Error::other("reset")).is_retryable());
        assert!(UpstreamError::Status {
            status: 503,
            reason: "Service Unavailable".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_stream_shape_errors_are_fatal() {
        assert!(!UpstreamError::MissingContentType.is_retryable());
        assert!(!UpstreamError::Protocol(ProtocolError::MissingBoundary).is_retryable());
        assert!(
            !UpstreamError::Protocol(ProtocolError::NotMultipart("image/jpeg".into()))
                .is_retryable()
        );
        assert!(!UpstreamError::Status {
            status: 404,
            reason: "Not Found".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_mid_stream_framing_errors_are_retryable() {
        let err: UpstreamError = ProtocolError::PartTooLarge { limit: 16 }.into();
        assert!(err.is_retryable());
    }
}
