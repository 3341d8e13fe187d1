//! Error types for heart-rate frame decoding.

use thiserror::Error;

/// Errors that can occur when decoding a Heart Rate Measurement frame.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in hrmon-core).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// A field declared by the flags runs past the end of the frame.
    #[error("Truncated frame: need {needed} bytes at offset {offset}, frame is {len} bytes")]
    Truncated {
        /// Width of the field being read.
        needed: usize,
        /// Offset the field starts at.
        offset: usize,
        /// Total frame length.
        len: usize,
    },

    /// The frame cannot be interpreted at all.
    #[error("Malformed frame: {0}")]
    Malformed(String),
}

impl DecodeError {
    /// Create a truncation error for a read of `needed` bytes at `offset`.
    pub fn truncated(needed: usize, offset: usize, len: usize) -> Self {
        Self::Truncated {
            needed,
            offset,
            len,
        }
    }
}

/// Result type alias using hrmon-types' DecodeError type.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
