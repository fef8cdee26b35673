//! Decode and encode error types.

use thiserror::Error;

/// Errors produced while decoding a wire message.
///
/// Every variant is detected before any out-of-bounds read takes place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("inconsistent {field}: declares {declared} bytes, only {available} available")]
    InconsistentLength {
        field: &'static str,
        declared: usize,
        available: usize,
    },

    #[error("unknown {kind} type: {code:#04x}")]
    UnknownType { kind: &'static str, code: u8 },

    #[error("invalid IP version: {0}")]
    InvalidVersion(u8),

    #[error("option at offset {offset} declares {length} bytes, {remaining} left in header")]
    OptionOverrun {
        offset: usize,
        length: usize,
        remaining: usize,
    },

    #[error("extension header chain longer than {max}")]
    ChainTooLong { max: usize },
}

impl DecodeError {
    /// Returns whether the input simply ended too early.
    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}

/// Errors produced while encoding a message whose contents do not fit the
/// wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} of {value} does not fit the wire field (max {max})")]
    FieldOverflow {
        field: &'static str,
        value: usize,
        max: usize,
    },
}
