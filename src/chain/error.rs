//! Frame chain error types

use std::time::Duration;

use thiserror::Error;

/// Error type for frame chain operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The frame was not published within the allowed time
    #[error("Waiting for frame {sequence} timed out after {timeout:?}")]
    WaitTimeout { sequence: u64, timeout: Duration },
}
