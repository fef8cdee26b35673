//! Stream error types.

use ofwire_protocol::{DecodeError, EncodeError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a [`MessageStream`](crate::MessageStream).
///
/// At most one error is delivered per stream; the stream ends right after.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection closed with {buffered} bytes of an incomplete message")]
    UnexpectedEof { buffered: usize },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("stream closed")]
    Closed,
}

impl StreamError {
    /// Returns whether the error came from the connection rather than its
    /// contents.
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            StreamError::Io(_) | StreamError::ConnectionClosed | StreamError::UnexpectedEof { .. }
        )
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    Parse(PathBuf, String),
}
